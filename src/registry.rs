use std::any::Any;
use std::collections::HashMap;

type Constructor = Box<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// Maps fully-qualified type names to zero-argument constructors.
///
/// The hierarchy graph only knows names; this table supplies the
/// construction capability for those names, registered explicitly by
/// the caller instead of discovered through runtime reflection.
#[derive(Default)]
pub struct TypeRegistry {
    constructors: HashMap<String, Constructor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a name to `T::default()`.
    pub fn register<T: Default + Any + Send>(&mut self, fqn: &str) {
        self.register_with(fqn, || Box::new(T::default()));
    }

    /// Binds a name to an arbitrary constructor.
    pub fn register_with(
        &mut self,
        fqn: &str,
        constructor: impl Fn() -> Box<dyn Any + Send> + Send + Sync + 'static,
    ) {
        self.constructors
            .insert(fqn.to_string(), Box::new(constructor));
    }

    /// Constructs a fresh instance, or `None` when the name was never
    /// registered.
    pub fn construct(&self, fqn: &str) -> Option<Box<dyn Any + Send>> {
        self.constructors.get(fqn).map(|constructor| constructor())
    }

    pub fn contains(&self, fqn: &str) -> bool {
        self.constructors.contains_key(fqn)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}
