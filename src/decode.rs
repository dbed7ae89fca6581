use byteorder::{BigEndian, ReadBytesExt};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Seek, SeekFrom};

use crate::error::{MetadataError, Result};
use crate::pool::{ConstantPool, truncated};

const MAGIC: u32 = 0xCAFE_BABE;
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ABSTRACT: u16 = 0x0400;
const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";

/// A runtime-visible annotation declared on a class, field or method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationRecord {
    /// Fully-qualified annotation type name in dotted form.
    pub name: String,
    /// Element name/value pairs in declaration order.
    pub elements: Vec<(String, AnnotationValue)>,
}

/// The value of one annotation element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AnnotationValue {
    /// String constants and class references. Primitive constants also
    /// land here with empty text: their pool slots carry no retained
    /// payload.
    Text(String),
    EnumConstant { type_name: String, constant: String },
    Nested(Box<AnnotationRecord>),
    List(Vec<AnnotationValue>),
}

/// The structural record decoded from one compiled class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassUnit {
    pub name: String,
    /// None for root types (superclass index 0).
    pub superclass: Option<String>,
    pub interfaces: BTreeSet<String>,
    pub annotations: Vec<AnnotationRecord>,
    pub field_annotations: BTreeMap<String, Vec<AnnotationRecord>>,
    pub method_annotations: BTreeMap<String, Vec<AnnotationRecord>>,
    pub is_interface: bool,
    pub is_abstract: bool,
}

impl ClassUnit {
    /// The class name after the final package separator.
    pub fn simple_name(&self) -> &str {
        simple_name_of(&self.name)
    }
}

pub(crate) fn simple_name_of(fqn: &str) -> &str {
    fqn.rsplit('.').next().unwrap_or(fqn)
}

/// Decodes one class-file byte image.
///
/// Returns `Ok(None)` when the magic number does not match: the scanner
/// feeds every candidate file through here and non-class files are
/// skipped, not errors. Anything inconsistent after a valid magic is a
/// [`MetadataError::MalformedUnit`] local to this unit.
pub fn read_class_unit(bytes: &[u8]) -> Result<Option<ClassUnit>> {
    let mut r = Cursor::new(bytes);

    match r.read_u32::<BigEndian>() {
        Ok(MAGIC) => {}
        _ => return Ok(None),
    }

    // Minor and major version: not interpreted.
    r.read_u16::<BigEndian>().map_err(truncated)?;
    r.read_u16::<BigEndian>().map_err(truncated)?;

    let pool = ConstantPool::read(&mut r)?;

    let flags = r.read_u16::<BigEndian>().map_err(truncated)?;
    let is_interface = flags & ACC_INTERFACE != 0;
    let is_abstract = flags & ACC_ABSTRACT != 0;

    let this_index = r.read_u16::<BigEndian>().map_err(truncated)?;
    let name = dotted(pool.expect_utf8(this_index)?);

    let super_index = r.read_u16::<BigEndian>().map_err(truncated)?;
    let superclass = if super_index == 0 {
        None
    } else {
        Some(dotted(pool.expect_utf8(super_index)?))
    };

    let interface_count = r.read_u16::<BigEndian>().map_err(truncated)?;
    let mut interfaces = BTreeSet::new();
    for _ in 0..interface_count {
        let index = r.read_u16::<BigEndian>().map_err(truncated)?;
        interfaces.insert(dotted(pool.expect_utf8(index)?));
    }

    let field_annotations = read_member_table(&mut r, &pool)?;
    let method_annotations = read_member_table(&mut r, &pool)?;
    let annotations = read_attribute_annotations(&mut r, &pool)?;

    Ok(Some(ClassUnit {
        name,
        superclass,
        interfaces,
        annotations,
        field_annotations,
        method_annotations,
        is_interface,
        is_abstract,
    }))
}

/// Reads a field or method table, keeping only member names and their
/// runtime-visible annotations.
fn read_member_table(
    r: &mut Cursor<&[u8]>,
    pool: &ConstantPool,
) -> Result<BTreeMap<String, Vec<AnnotationRecord>>> {
    let count = r.read_u16::<BigEndian>().map_err(truncated)?;
    let mut members = BTreeMap::new();

    for _ in 0..count {
        r.read_u16::<BigEndian>().map_err(truncated)?; // access flags
        let name_index = r.read_u16::<BigEndian>().map_err(truncated)?;
        let member_name = pool.expect_utf8(name_index)?.to_string();
        r.read_u16::<BigEndian>().map_err(truncated)?; // descriptor

        let annotations = read_attribute_annotations(r, pool)?;
        members.entry(member_name).or_insert(annotations);
    }

    Ok(members)
}

/// Reads one attribute list, decoding `RuntimeVisibleAnnotations`
/// attributes and skipping every other kind by its declared byte length.
fn read_attribute_annotations(
    r: &mut Cursor<&[u8]>,
    pool: &ConstantPool,
) -> Result<Vec<AnnotationRecord>> {
    let count = r.read_u16::<BigEndian>().map_err(truncated)?;
    let mut annotations = Vec::new();

    for _ in 0..count {
        let name_index = r.read_u16::<BigEndian>().map_err(truncated)?;
        let attribute_name = pool.expect_utf8(name_index)?;
        let length = r.read_u32::<BigEndian>().map_err(truncated)? as u64;
        let body_end = r.position().checked_add(length).ok_or_else(|| {
            MetadataError::MalformedUnit("attribute length overflows the stream".to_string())
        })?;
        if body_end > r.get_ref().len() as u64 {
            return Err(MetadataError::MalformedUnit(format!(
                "attribute {attribute_name} runs past end of stream"
            )));
        }

        if attribute_name == RUNTIME_VISIBLE_ANNOTATIONS {
            let annotation_count = r.read_u16::<BigEndian>().map_err(truncated)?;
            for _ in 0..annotation_count {
                annotations.push(read_annotation(r, pool)?);
            }
        }

        // Realign on the declared length whether the body was decoded or
        // skipped; the length field is authoritative.
        r.seek(SeekFrom::Start(body_end)).map_err(truncated)?;
    }

    Ok(annotations)
}

fn read_annotation(r: &mut Cursor<&[u8]>, pool: &ConstantPool) -> Result<AnnotationRecord> {
    let type_index = r.read_u16::<BigEndian>().map_err(truncated)?;
    let name = descriptor_to_dotted(pool.expect_utf8(type_index)?);

    let pair_count = r.read_u16::<BigEndian>().map_err(truncated)?;
    let mut elements = Vec::with_capacity(pair_count as usize);
    for _ in 0..pair_count {
        let name_index = r.read_u16::<BigEndian>().map_err(truncated)?;
        let element_name = pool.expect_utf8(name_index)?.to_string();
        let value = read_element_value(r, pool)?;
        elements.push((element_name, value));
    }

    Ok(AnnotationRecord { name, elements })
}

fn read_element_value(r: &mut Cursor<&[u8]>, pool: &ConstantPool) -> Result<AnnotationValue> {
    let tag = r.read_u8().map_err(truncated)?;
    match tag {
        b's' => {
            let index = r.read_u16::<BigEndian>().map_err(truncated)?;
            Ok(AnnotationValue::Text(pool.expect_utf8(index)?.to_string()))
        }
        b'c' => {
            let index = r.read_u16::<BigEndian>().map_err(truncated)?;
            Ok(AnnotationValue::Text(descriptor_to_dotted(
                pool.expect_utf8(index)?,
            )))
        }
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => {
            // The referenced literal slot was skipped while reading the
            // pool, so the value itself is not recoverable.
            let index = r.read_u16::<BigEndian>().map_err(truncated)?;
            Ok(AnnotationValue::Text(
                pool.utf8(index).unwrap_or_default().to_string(),
            ))
        }
        b'e' => {
            let type_index = r.read_u16::<BigEndian>().map_err(truncated)?;
            let const_index = r.read_u16::<BigEndian>().map_err(truncated)?;
            Ok(AnnotationValue::EnumConstant {
                type_name: descriptor_to_dotted(pool.expect_utf8(type_index)?),
                constant: pool.expect_utf8(const_index)?.to_string(),
            })
        }
        b'@' => Ok(AnnotationValue::Nested(Box::new(read_annotation(r, pool)?))),
        b'[' => {
            let count = r.read_u16::<BigEndian>().map_err(truncated)?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(read_element_value(r, pool)?);
            }
            Ok(AnnotationValue::List(values))
        }
        other => Err(MetadataError::MalformedUnit(format!(
            "unknown annotation element tag {other:#x}"
        ))),
    }
}

fn dotted(internal: &str) -> String {
    internal.replace('/', ".")
}

/// `Lorg/example/Widget;` -> `org.example.Widget`.
fn descriptor_to_dotted(descriptor: &str) -> String {
    let trimmed = descriptor
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .unwrap_or(descriptor);
    dotted(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testbytes::ClassBytes;

    #[test]
    fn bad_magic_is_skipped_not_an_error() {
        assert_eq!(read_class_unit(b"not a class file").unwrap(), None);
        assert_eq!(read_class_unit(&[]).unwrap(), None);
    }

    #[test]
    fn truncation_after_magic_is_malformed() {
        let bytes = [0xCA, 0xFE, 0xBA, 0xBE, 0x00];
        assert!(matches!(
            read_class_unit(&bytes),
            Err(MetadataError::MalformedUnit(_))
        ));
    }

    #[test]
    fn decodes_names_interfaces_and_flags() {
        let bytes = ClassBytes::new("org/example/Wheel")
            .superclass("org/example/Part")
            .interface("org/example/Rotating")
            .build();

        let unit = read_class_unit(&bytes).unwrap().unwrap();
        assert_eq!(unit.name, "org.example.Wheel");
        assert_eq!(unit.superclass.as_deref(), Some("org.example.Part"));
        assert!(unit.interfaces.contains("org.example.Rotating"));
        assert!(!unit.is_interface);
        assert!(!unit.is_abstract);
        assert_eq!(unit.simple_name(), "Wheel");
    }

    #[test]
    fn decodes_interface_and_abstract_bits() {
        let bytes = ClassBytes::new("org/example/Rotating")
            .mark_interface()
            .build();
        let unit = read_class_unit(&bytes).unwrap().unwrap();
        assert!(unit.is_interface);

        let bytes = ClassBytes::new("org/example/Part")
            .superclass("java/lang/Object")
            .mark_abstract()
            .build();
        let unit = read_class_unit(&bytes).unwrap().unwrap();
        assert!(unit.is_abstract);
        assert!(!unit.is_interface);
    }

    #[test]
    fn root_superclass_index_zero_is_none() {
        let bytes = ClassBytes::new("org/example/Root").build();
        let unit = read_class_unit(&bytes).unwrap().unwrap();
        assert_eq!(unit.superclass, None);
    }

    #[test]
    fn decodes_field_annotation_round_trip() {
        let bytes = ClassBytes::new("org/example/Wheel")
            .superclass("java/lang/Object")
            .interface("org/example/Rotating")
            .field_annotation("spokes", "Lorg/example/Property;", &[("name", "spokes")])
            .build();

        let unit = read_class_unit(&bytes).unwrap().unwrap();
        assert_eq!(
            unit.interfaces.iter().collect::<Vec<_>>(),
            vec!["org.example.Rotating"]
        );
        let annotations = unit.field_annotations.get("spokes").unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].name, "org.example.Property");
        assert_eq!(
            annotations[0].elements,
            vec![(
                "name".to_string(),
                AnnotationValue::Text("spokes".to_string())
            )]
        );
    }

    #[test]
    fn decodes_method_annotation() {
        let bytes = ClassBytes::new("org/example/Wheel")
            .superclass("java/lang/Object")
            .method_annotation("rotate", "Lorg/example/Transient;", &[])
            .build();

        let unit = read_class_unit(&bytes).unwrap().unwrap();
        let annotations = unit.method_annotations.get("rotate").unwrap();
        assert_eq!(annotations[0].name, "org.example.Transient");
    }

    #[test]
    fn decodes_class_level_annotation() {
        let bytes = ClassBytes::new("org/example/Wheel")
            .superclass("java/lang/Object")
            .class_annotation("Lorg/example/NodeEntity;", &[("label", "Wheel")])
            .build();

        let unit = read_class_unit(&bytes).unwrap().unwrap();
        assert_eq!(unit.annotations.len(), 1);
        assert_eq!(unit.annotations[0].name, "org.example.NodeEntity");
    }

    #[test]
    fn annotation_records_serialize_with_their_elements() {
        let bytes = ClassBytes::new("org/example/Wheel")
            .superclass("java/lang/Object")
            .class_annotation("Lorg/example/NodeEntity;", &[("label", "Wheel")])
            .build();

        let unit = read_class_unit(&bytes).unwrap().unwrap();
        let json = serde_json::to_value(&unit.annotations).unwrap();
        assert_eq!(json[0]["name"], "org.example.NodeEntity");
        assert_eq!(json[0]["elements"][0][0], "label");
        assert_eq!(json[0]["elements"][0][1]["Text"], "Wheel");
    }

    #[test]
    fn unknown_attributes_are_skipped_by_length() {
        let bytes = ClassBytes::new("org/example/Wheel")
            .superclass("java/lang/Object")
            .class_attribute("Deprecated", &[])
            .class_annotation("Lorg/example/NodeEntity;", &[])
            .build();

        let unit = read_class_unit(&bytes).unwrap().unwrap();
        assert_eq!(unit.annotations.len(), 1);
    }

    #[test]
    fn descriptor_conversion() {
        assert_eq!(descriptor_to_dotted("Lorg/example/Widget;"), "org.example.Widget");
        assert_eq!(descriptor_to_dotted("org/example/Widget"), "org.example.Widget");
    }
}
