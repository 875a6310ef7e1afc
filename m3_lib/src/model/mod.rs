//---------------------------------------------------------------------------//
// Copyright (c) 2017-2024 Ismael Gutiérrez González. All rights reserved.
//
// This file is part of the M3 Model Codec (m3_lib) project,
// which can be found here: https://github.com/Frodo45127/m3_lib.
//
// This file is licensed under the MIT license, which can be found here:
// https://github.com/Frodo45127/m3_lib/blob/master/LICENSE.
//---------------------------------------------------------------------------//

//! This module contains the in-memory form of the records an M3 file is made of.
//!
//! An [`Instance`] is one record of one structure version: the ordered [`Value`]s of
//! its fields. Referenced content ([`Payload`]) is held behind shared handles
//! ([`SharedPayload`]), because the file format dedupes by identity: two fields
//! pointing at the *same* list share one section on disk, while two equal-but-distinct
//! lists produce two sections. Cloning a handle preserves that sharing, cloning a
//! payload breaks it, exactly like the on-disk format would.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::binary::{ReadBytes, WriteBytes};
use crate::error::{M3LibError, Result};
use crate::schema::StructureDescription;
use crate::sections::{IndexMaker, Section};

#[cfg(test)] mod model_test;

/// Shared handle to referenced content. Identity of the handle decides section sharing on save.
pub type SharedPayload = Rc<RefCell<Payload>>;

//---------------------------------------------------------------------------//
//                              Enum & Structs
//---------------------------------------------------------------------------//

/// This enum holds the content a section (and therefore a resolved reference) can carry.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {

    /// Content of a `CHAR` section: an ASCII string, NUL-terminated on disk.
    ///
    /// `None` is the defaulted, never-set string: it writes no section at all, while
    /// `Some("")` still costs one byte (the terminator).
    Chars(Option<String>),

    /// Content of an `U8__` section: a raw byte buffer.
    Bytes(Vec<u8>),

    /// Content of a `REAL` section.
    Reals(Vec<f32>),

    /// Content of an `I16_`/`U16_`/`I32_`/`U32_`/`FLAG` section, widened to i64.
    Ints(Vec<i64>),

    /// Content of a structure section: a list of records.
    Instances(Vec<Instance>),
}

/// On-disk form of a reference: the three-word record linking to a section.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reference {

    /// Number of referenced elements. For `CHAR`, includes the NUL terminator.
    pub entries: u32,

    /// Index of the referenced section in the index table.
    pub index: u32,

    /// Flags of the reference. No semantic meaning for the codec, preserved verbatim.
    pub flags: u32,
}

/// In-memory form of a reference: a shared handle to the referenced content.
#[derive(Clone, Debug, PartialEq)]
pub struct Pointer {
    target: SharedPayload,
    flags: u32,
}

/// This enum holds the decoded value of a single field.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {

    /// Any integer field, widened to i64.
    Int(i64),

    /// A float or fixed8 field.
    Float(f32),

    /// An opaque byte blob field.
    Bytes(Vec<u8>),

    /// A tag field, as a 3 or 4 character ASCII string.
    Tag(String),

    /// An embedded structure field.
    Struct(Box<Instance>),

    /// A reference field, before resolution or after flattening for save.
    Ref(Reference),

    /// A reference field with its content resolved.
    Pointer(Pointer),
}

/// One record of a specific structure version: its description plus one value per field.
#[derive(Clone, Debug)]
pub struct Instance {
    description: Arc<StructureDescription>,
    values: Vec<Value>,
}

//---------------------------------------------------------------------------//
//                      Implementation of Payload
//---------------------------------------------------------------------------//

impl Payload {

    /// This function wraps the payload in a fresh shared handle.
    pub fn shared(self) -> SharedPayload {
        Rc::new(RefCell::new(self))
    }

    /// This function returns a copy of the first `entries` elements of the payload.
    ///
    /// For strings `entries` counts the NUL terminator, like the on-disk reference does.
    pub fn sliced(&self, entries: u32) -> Self {
        let entries = entries as usize;
        match self {
            Self::Chars(None) => Self::Chars(None),
            Self::Chars(Some(string)) => Self::Chars(Some(string[..entries.saturating_sub(1).min(string.len())].to_owned())),
            Self::Bytes(bytes) => Self::Bytes(bytes[..entries.min(bytes.len())].to_vec()),
            Self::Reals(values) => Self::Reals(values[..entries.min(values.len())].to_vec()),
            Self::Ints(values) => Self::Ints(values[..entries.min(values.len())].to_vec()),
            Self::Instances(instances) => Self::Instances(instances[..entries.min(instances.len())].to_vec()),
        }
    }
}

//---------------------------------------------------------------------------//
//                      Implementation of Pointer
//---------------------------------------------------------------------------//

impl Pointer {

    /// This function builds a pointer to the provided content.
    pub fn new(target: SharedPayload, flags: u32) -> Self {
        Self {
            target,
            flags,
        }
    }

    /// This function returns the handle to the referenced content.
    pub fn target(&self) -> &SharedPayload {
        &self.target
    }

    /// This function returns the flags the reference carries on disk.
    pub fn flags(&self) -> &u32 {
        &self.flags
    }
}

//---------------------------------------------------------------------------//
//                      Implementation of Instance
//---------------------------------------------------------------------------//

impl Instance {

    /// This function creates a new instance of the provided structure version, with
    /// every field set to its default.
    pub fn new(description: &Arc<StructureDescription>) -> Self {
        let values = description.fields().iter().map(|field| field.default_value()).collect();
        Self {
            description: description.clone(),
            values,
        }
    }

    /// This function reads an instance of the provided structure version from the
    /// current position of `data`.
    pub fn from_bytes<R: ReadBytes>(description: &Arc<StructureDescription>, data: &mut R, check_expected_value: bool) -> Result<Self> {
        let start = data.stream_position()?;

        let mut values = Vec::with_capacity(description.fields().len());
        for field in description.fields() {
            values.push(field.read_value(data, check_expected_value, description)?);
        }

        // The field sizes are validated against the structure size on schema load,
        // so a mismatch here means a field read the wrong amount of bytes.
        let read = data.stream_position()? - start;
        if read != *description.size() as u64 {
            return Err(M3LibError::DecodingInstanceSizeMismatch(description.name().to_owned(), *description.size(), read));
        }

        Ok(Self {
            description: description.clone(),
            values,
        })
    }

    /// This function writes the instance at the current position of `buffer`.
    pub fn write<W: WriteBytes>(&self, buffer: &mut W) -> Result<()> {
        for (field, value) in self.description.fields().iter().zip(self.values.iter()) {
            field.write_value(value, buffer, &self.description)?;
        }
        Ok(())
    }

    /// This function returns the structure description of this instance.
    pub fn description(&self) -> &Arc<StructureDescription> {
        &self.description
    }

    /// This function returns the values of this instance, in field order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// This function returns the value of the field with the provided name.
    pub fn value(&self, field_name: &str) -> Result<&Value> {
        let index = self.field_index(field_name)?;
        Ok(&self.values[index])
    }

    /// This function replaces the value of the field with the provided name.
    pub fn set_value(&mut self, field_name: &str, value: Value) -> Result<()> {
        let index = self.field_index(field_name)?;
        self.values[index] = value;
        Ok(())
    }

    /// This function returns the value of an integer field.
    pub fn int(&self, field_name: &str) -> Result<i64> {
        match self.value(field_name)? {
            Value::Int(value) => Ok(*value),
            _ => Err(M3LibError::ValidationNotAnInteger(self.variable(field_name))),
        }
    }

    /// This function sets the value of an integer field.
    pub fn set_int(&mut self, field_name: &str, value: i64) -> Result<()> {
        self.set_value(field_name, Value::Int(value))
    }

    /// This function returns the value of a float or fixed8 field.
    pub fn float(&self, field_name: &str) -> Result<f32> {
        match self.value(field_name)? {
            Value::Float(value) => Ok(*value),
            _ => Err(M3LibError::ValidationNotAFloat(self.variable(field_name))),
        }
    }

    /// This function sets the value of a float or fixed8 field.
    pub fn set_float(&mut self, field_name: &str, value: f32) -> Result<()> {
        self.set_value(field_name, Value::Float(value))
    }

    /// This function returns the value of a tag field.
    pub fn tag(&self, field_name: &str) -> Result<&str> {
        match self.value(field_name)? {
            Value::Tag(value) => Ok(value),
            _ => Err(M3LibError::ValidationNotATag(self.variable(field_name))),
        }
    }

    /// This function sets the value of a tag field.
    pub fn set_tag(&mut self, field_name: &str, value: &str) -> Result<()> {
        self.set_value(field_name, Value::Tag(value.to_owned()))
    }

    /// This function returns the resolved content of a reference field.
    pub fn pointer(&self, field_name: &str) -> Result<&Pointer> {
        match self.value(field_name)? {
            Value::Pointer(pointer) => Ok(pointer),
            _ => Err(M3LibError::ValidationUnresolvedReference(self.variable(field_name))),
        }
    }

    /// This function points a reference field at the provided content, with flags zeroed.
    pub fn set_pointer(&mut self, field_name: &str, target: SharedPayload) -> Result<()> {
        self.set_value(field_name, Value::Pointer(Pointer::new(target, 0)))
    }

    /// This function returns the state of a named bit of a flag field.
    pub fn named_bit(&self, field_name: &str, bit_name: &str) -> Result<bool> {
        let mask = self.bit_mask(field_name, bit_name)?;
        Ok((self.int(field_name)? & mask) != 0)
    }

    /// This function sets or clears a named bit of a flag field.
    pub fn set_named_bit(&mut self, field_name: &str, bit_name: &str, value: bool) -> Result<()> {
        let mask = self.bit_mask(field_name, bit_name)?;
        let current = self.int(field_name)?;
        let new = if value { current | mask } else { current & !mask };
        self.set_int(field_name, new)
    }

    /// This function returns the name -> mask pairs of a flag field.
    pub fn bit_name_mask_pairs(&self, field_name: &str) -> Result<Vec<(String, i64)>> {
        let index = self.field_index(field_name)?;
        let field = &self.description.fields()[index];
        match field.bits() {
            Some(bits) => Ok(bits.iter().map(|(name, mask)| (name.to_owned(), *mask)).collect()),
            None => Err(M3LibError::InstanceNotAFlagField(self.variable(field_name))),
        }
    }

    /// This function walks every reference field of this instance (and everything below
    /// it), allocating sections and flattening the content into index references.
    pub fn introduce_index_references(&mut self, index_maker: &mut IndexMaker) -> Result<()> {
        let description = self.description.clone();
        for (field, value) in description.fields().iter().zip(self.values.iter_mut()) {
            field.introduce_index_references(value, index_maker, &description)?;
        }
        Ok(())
    }

    /// This function replaces every reference record of this instance (and everything
    /// below it) with the content of the section it points to.
    pub fn resolve_references(&mut self, sections: &[Section]) -> Result<()> {
        let description = self.description.clone();
        for (field, value) in description.fields().iter().zip(self.values.iter_mut()) {
            field.resolve_index_references(value, sections, &description)?;
        }
        Ok(())
    }

    /// This function returns the position of the field with the provided name.
    fn field_index(&self, field_name: &str) -> Result<usize> {
        self.description.field_index(field_name)
            .ok_or_else(|| M3LibError::InstanceFieldNotFound(self.description.name().to_owned(), field_name.to_owned()))
    }

    /// This function returns the mask of a named bit of a flag field.
    fn bit_mask(&self, field_name: &str, bit_name: &str) -> Result<i64> {
        let index = self.field_index(field_name)?;
        let field = &self.description.fields()[index];
        let bits = field.bits().ok_or_else(|| M3LibError::InstanceNotAFlagField(self.variable(field_name)))?;
        bits.get(bit_name)
            .copied()
            .ok_or_else(|| M3LibError::InstanceBitNotFound(self.variable(field_name), bit_name.to_owned()))
    }

    /// Fully qualified name of a field of this instance, for error reporting.
    fn variable(&self, field_name: &str) -> String {
        format!("{}.{}", self.description.name(), field_name)
    }
}

/// Instances compare by deep value equality: same structure name and version, equal
/// field values. Two handles pointing at equal content compare equal even when the
/// content is not shared, which is what the round-trip guarantees promise.
impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.description.name() == other.description.name()
            && self.description.version() == other.description.version()
            && self.values == other.values
    }
}
