//! Fabricates minimal class-file byte images for tests.
//!
//! Only the slices of the format the decoder consumes are emitted: a
//! constant pool of UTF8 and class entries, the header names, interface
//! and member tables, and `RuntimeVisibleAnnotations` attributes with
//! string element values.

#![allow(dead_code)]

use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

const ACC_PUBLIC_SUPER: u16 = 0x0021;
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ABSTRACT: u16 = 0x0400;

enum PoolConst {
    Utf8(String),
    Class(u16),
}

struct Member {
    name_index: u16,
    descriptor_index: u16,
    attributes: Vec<RawAttribute>,
}

struct RawAttribute {
    name_index: u16,
    body: Vec<u8>,
}

pub struct ClassBytes {
    pool: Vec<PoolConst>,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Member>,
    methods: Vec<Member>,
    class_attributes: Vec<RawAttribute>,
}

impl ClassBytes {
    pub fn new(internal_name: &str) -> Self {
        let mut builder = ClassBytes {
            pool: Vec::new(),
            access_flags: ACC_PUBLIC_SUPER,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            class_attributes: Vec::new(),
        };
        builder.this_class = builder.class_const(internal_name);
        builder
    }

    pub fn superclass(mut self, internal_name: &str) -> Self {
        self.super_class = self.class_const(internal_name);
        self
    }

    pub fn interface(mut self, internal_name: &str) -> Self {
        let index = self.class_const(internal_name);
        self.interfaces.push(index);
        self
    }

    pub fn mark_interface(mut self) -> Self {
        self.access_flags |= ACC_INTERFACE | ACC_ABSTRACT;
        self
    }

    pub fn mark_abstract(mut self) -> Self {
        self.access_flags |= ACC_ABSTRACT;
        self
    }

    pub fn class_annotation(mut self, descriptor: &str, pairs: &[(&str, &str)]) -> Self {
        let attribute = self.annotations_attribute(&[(descriptor, pairs)]);
        self.class_attributes.push(attribute);
        self
    }

    /// An arbitrary attribute the decoder is expected to skip.
    pub fn class_attribute(mut self, name: &str, body: &[u8]) -> Self {
        let name_index = self.utf8_const(name);
        self.class_attributes.push(RawAttribute {
            name_index,
            body: body.to_vec(),
        });
        self
    }

    pub fn field(mut self, name: &str) -> Self {
        let member = self.member(name, "Ljava/lang/Object;", Vec::new());
        self.fields.push(member);
        self
    }

    pub fn field_annotation(mut self, name: &str, descriptor: &str, pairs: &[(&str, &str)]) -> Self {
        let attribute = self.annotations_attribute(&[(descriptor, pairs)]);
        let member = self.member(name, "Ljava/lang/Object;", vec![attribute]);
        self.fields.push(member);
        self
    }

    pub fn method_annotation(mut self, name: &str, descriptor: &str, pairs: &[(&str, &str)]) -> Self {
        let attribute = self.annotations_attribute(&[(descriptor, pairs)]);
        let member = self.member(name, "()V", vec![attribute]);
        self.methods.push(member);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<BigEndian>(0xCAFE_BABE).unwrap();
        out.write_u16::<BigEndian>(0).unwrap(); // minor
        out.write_u16::<BigEndian>(52).unwrap(); // major

        out.write_u16::<BigEndian>(self.pool.len() as u16 + 1).unwrap();
        for entry in &self.pool {
            match entry {
                PoolConst::Utf8(text) => {
                    out.write_u8(1).unwrap();
                    out.write_u16::<BigEndian>(text.len() as u16).unwrap();
                    out.write_all(text.as_bytes()).unwrap();
                }
                PoolConst::Class(name_index) => {
                    out.write_u8(7).unwrap();
                    out.write_u16::<BigEndian>(*name_index).unwrap();
                }
            }
        }

        out.write_u16::<BigEndian>(self.access_flags).unwrap();
        out.write_u16::<BigEndian>(self.this_class).unwrap();
        out.write_u16::<BigEndian>(self.super_class).unwrap();

        out.write_u16::<BigEndian>(self.interfaces.len() as u16).unwrap();
        for index in &self.interfaces {
            out.write_u16::<BigEndian>(*index).unwrap();
        }

        write_members(&mut out, &self.fields);
        write_members(&mut out, &self.methods);
        write_attributes(&mut out, &self.class_attributes);
        out
    }

    fn member(&mut self, name: &str, descriptor: &str, attributes: Vec<RawAttribute>) -> Member {
        Member {
            name_index: self.utf8_const(name),
            descriptor_index: self.utf8_const(descriptor),
            attributes,
        }
    }

    fn annotations_attribute(&mut self, annotations: &[(&str, &[(&str, &str)])]) -> RawAttribute {
        let name_index = self.utf8_const("RuntimeVisibleAnnotations");
        let mut body = Vec::new();
        body.write_u16::<BigEndian>(annotations.len() as u16).unwrap();
        for (descriptor, pairs) in annotations {
            let type_index = self.utf8_const(descriptor);
            body.write_u16::<BigEndian>(type_index).unwrap();
            body.write_u16::<BigEndian>(pairs.len() as u16).unwrap();
            for (element, value) in *pairs {
                let element_index = self.utf8_const(element);
                let value_index = self.utf8_const(value);
                body.write_u16::<BigEndian>(element_index).unwrap();
                body.write_u8(b's').unwrap();
                body.write_u16::<BigEndian>(value_index).unwrap();
            }
        }
        RawAttribute { name_index, body }
    }

    fn utf8_const(&mut self, text: &str) -> u16 {
        for (i, entry) in self.pool.iter().enumerate() {
            if let PoolConst::Utf8(existing) = entry
                && existing == text
            {
                return i as u16 + 1;
            }
        }
        self.pool.push(PoolConst::Utf8(text.to_string()));
        self.pool.len() as u16
    }

    fn class_const(&mut self, internal_name: &str) -> u16 {
        let name_index = self.utf8_const(internal_name);
        for (i, entry) in self.pool.iter().enumerate() {
            if let PoolConst::Class(existing) = entry
                && *existing == name_index
            {
                return i as u16 + 1;
            }
        }
        self.pool.push(PoolConst::Class(name_index));
        self.pool.len() as u16
    }
}

fn write_members(out: &mut Vec<u8>, members: &[Member]) {
    out.write_u16::<BigEndian>(members.len() as u16).unwrap();
    for member in members {
        out.write_u16::<BigEndian>(0x0002).unwrap(); // private
        out.write_u16::<BigEndian>(member.name_index).unwrap();
        out.write_u16::<BigEndian>(member.descriptor_index).unwrap();
        write_attributes(out, &member.attributes);
    }
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[RawAttribute]) {
    out.write_u16::<BigEndian>(attributes.len() as u16).unwrap();
    for attribute in attributes {
        out.write_u16::<BigEndian>(attribute.name_index).unwrap();
        out.write_u32::<BigEndian>(attribute.body.len() as u32).unwrap();
        out.write_all(&attribute.body).unwrap();
    }
}
