//---------------------------------------------------------------------------//
// Copyright (c) 2017-2024 Ismael Gutiérrez González. All rights reserved.
//
// This file is part of the M3 Model Codec (m3_lib) project,
// which can be found here: https://github.com/Frodo45127/m3_lib.
//
// This file is licensed under the MIT license, which can be found here:
// https://github.com/Frodo45127/m3_lib/blob/master/LICENSE.
//---------------------------------------------------------------------------//

//! This module contains the field descriptors the structure definitions resolve into.
//!
//! Every field of a structure version is described by a [`Field`], whose [`FieldKind`]
//! decides how the field behaves for the whole capability set: reading its bytes,
//! writing them back, defaulting, validating, and introducing/resolving index
//! references. The containing structure's logic is then just a sweep over its field
//! list, with no per-type knowledge of its own.

use getset::Getters;
use regex::Regex;

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use crate::binary::{ReadBytes, WriteBytes};
use crate::error::{M3LibError, Result};
use crate::model::{Instance, Payload, Pointer, Reference, Value};
use crate::schema::{StructureDescription, StructureHistory};
use crate::schema::raw::RawField;
use crate::sections::{IndexMaker, Section};
use crate::validator;

/// Field types that end up as reference fields, with the sub-variant decided by `refTo`.
const REFERENCE_STRUCTURE_NAMES: [&str; 2] = ["Reference", "SmallReference"];

/// Matches type names with an explicit version suffix, like `VFLGV0`.
static TYPE_WITH_VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+)V(\d+)$").unwrap());

/// Matches the mask literals the bit nodes use.
static BIT_MASK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0x[0-9]+$").unwrap());

//---------------------------------------------------------------------------//
//                              Enum & Structs
//---------------------------------------------------------------------------//

/// This struct holds all the relevant data to decode/encode one field of a structure version.
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct Field {

    /// Name of the field.
    name: String,

    /// First structure version that includes this field. Open-ended if `None`.
    since_version: Option<u32>,

    /// Last structure version that includes this field. Open-ended if `None`.
    till_version: Option<u32>,

    /// Size in bytes of the field.
    size: u32,

    /// What the field actually is, and how it behaves.
    #[getset(skip)]
    kind: FieldKind,
}

/// This enum defines every type of field the lib can encode/decode.
#[derive(Clone, Debug)]
pub enum FieldKind {

    /// A 3 or 4 character ASCII tag, stored in reverse byte order on disk.
    Tag,

    /// An integer of 1, 2 or 4 bytes, signed or unsigned, with an optional
    /// name -> mask map when the integer is a flag field.
    Int {
        int_kind: IntKind,
        default: i64,
        expected: Option<i64>,
        bits: BTreeMap<String, i64>,
    },

    /// An IEEE-754 f32.
    Float {
        default: f32,
        expected: Option<f32>,
    },

    /// An f32 in \[-1.0, 1.0\] packed into a single byte.
    Fixed8 {
        default: f32,
        expected: Option<f32>,
    },

    /// An opaque byte blob of fixed size.
    Bytes {
        default: Vec<u8>,
        expected: Option<Vec<u8>>,
    },

    /// Another structure, inlined at this field's offset.
    Embedded {
        description: Arc<StructureDescription>,
    },

    /// A reference record pointing to another section of the file.
    Reference {

        /// Description of the on-disk record (`Reference` or `SmallReference`).
        record: Arc<StructureDescription>,

        /// What the reference points to.
        to: RefKind,
    },
}

/// Integer widths a field or a referenced buffer can use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
}

/// This enum defines what kind of content a reference field points to.
#[derive(Clone, Debug)]
pub enum RefKind {

    /// No `refTo` declared. Contents must stay empty on the write path.
    Unknown,

    /// A NUL-terminated ASCII string (`CHAR` section).
    Char(Arc<StructureHistory>),

    /// A raw byte buffer (`U8__` section).
    Byte(Arc<StructureHistory>),

    /// A list of f32 (`REAL` section).
    Real(Arc<StructureHistory>),

    /// A list of integers (`I16_`/`U16_`/`I32_`/`U32_` sections).
    Int {
        history: Arc<StructureHistory>,
        min: i64,
        max: i64,
    },

    /// A list of instances of another structure.
    Structure(Arc<StructureHistory>),
}

//---------------------------------------------------------------------------//
//                      Implementation of Field
//---------------------------------------------------------------------------//

impl Field {

    /// This function builds a typed field from its raw XML node.
    ///
    /// `structures` must contain every structure defined before the current one in the
    /// document: both embedded structures and `refTo` targets are required to already
    /// be there, as forward references are not allowed.
    pub fn from_raw(
        raw: &RawField,
        structures: &std::collections::HashMap<String, Arc<StructureHistory>>,
        structure_name: &str,
    ) -> Result<Self> {
        let name = raw.name.clone().ok_or_else(|| M3LibError::SchemaFieldWithoutName(structure_name.to_owned()))?;
        let variable = format!("{structure_name}.{name}");

        let since_version = parse_optional_u32(&raw.since_version, &variable)?;
        let till_version = parse_optional_u32(&raw.till_version, &variable)?;
        let bits = parse_bits(raw, &variable)?;

        let (size, kind) = match raw.field_type.as_deref() {
            Some("tag") => (4, FieldKind::Tag),
            Some(type_name @ ("int8" | "uint8" | "int16" | "uint16" | "int32" | "uint32")) => {
                let int_kind = match type_name {
                    "int8" => IntKind::I8,
                    "uint8" => IntKind::U8,
                    "int16" => IntKind::I16,
                    "uint16" => IntKind::U16,
                    "int32" => IntKind::I32,
                    _ => IntKind::U32,
                };
                let expected = match &raw.expected_value {
                    Some(value) => Some(parse_int_literal(value).ok_or_else(|| M3LibError::SchemaValueNotAnInteger(variable.to_owned(), value.to_owned()))?),
                    None => None,
                };
                let default = match &raw.default_value {
                    Some(value) => parse_int_literal(value).ok_or_else(|| M3LibError::SchemaValueNotAnInteger(variable.to_owned(), value.to_owned()))?,
                    None => expected.unwrap_or(0),
                };
                (int_kind.size(), FieldKind::Int { int_kind, default, expected, bits })
            },
            Some(type_name @ ("float" | "fixed8")) => {
                let expected = match &raw.expected_value {
                    Some(value) => Some(value.parse::<f32>().map_err(|_| M3LibError::SchemaValueNotAFloat(variable.to_owned(), value.to_owned()))?),
                    None => None,
                };
                let default = match &raw.default_value {
                    Some(value) => value.parse::<f32>().map_err(|_| M3LibError::SchemaValueNotAFloat(variable.to_owned(), value.to_owned()))?,
                    None => expected.unwrap_or(0.0),
                };
                if type_name == "float" {
                    (4, FieldKind::Float { default, expected })
                } else {
                    (1, FieldKind::Fixed8 { default, expected })
                }
            },
            None => {
                let size = match &raw.size {
                    Some(value) => value.parse::<u32>().map_err(|_| M3LibError::SchemaValueNotAnInteger(variable.to_owned(), value.to_owned()))?,
                    None => return Err(M3LibError::SchemaFieldWithoutSize(variable)),
                };
                let expected = match &raw.expected_value {
                    Some(value) => Some(parse_hex_bytes(value, size, &variable)?),
                    None => None,
                };
                let default = match &raw.default_value {
                    Some(value) => parse_hex_bytes(value, size, &variable)?,
                    None => expected.clone().unwrap_or_else(|| vec![0; size as usize]),
                };
                (size, FieldKind::Bytes { default, expected })
            },

            // Anything else names another structure, either with an explicit version
            // suffix or with version 0 implied.
            Some(type_name) => {
                let (base_name, version) = match TYPE_WITH_VERSION.captures(type_name) {
                    Some(captures) => {
                        let version = captures[2].parse::<u32>().map_err(|_| M3LibError::SchemaValueNotAnInteger(variable.to_owned(), type_name.to_owned()))?;
                        (captures[1].to_owned(), version)
                    },
                    None => (type_name.to_owned(), 0),
                };

                let base_history = structures.get(&base_name)
                    .ok_or_else(|| M3LibError::SchemaEmbeddedStructureNotDefined(base_name.to_owned(), variable.to_owned()))?;
                let base_description = base_history.version(version)
                    .ok_or_else(|| M3LibError::SchemaVersionNotFound(base_name.to_owned(), version))?;

                if REFERENCE_STRUCTURE_NAMES.contains(&base_name.as_str()) {
                    let to = match raw.ref_to.as_deref() {
                        None => RefKind::Unknown,
                        Some(ref_to) => {
                            let history = structures.get(ref_to)
                                .ok_or_else(|| M3LibError::SchemaReferencedStructureNotDefined(ref_to.to_owned(), variable.to_owned()))?;
                            match ref_to {
                                "CHAR" => RefKind::Char(history.clone()),
                                "U8__" => RefKind::Byte(history.clone()),
                                "REAL" => RefKind::Real(history.clone()),
                                "I16_" => RefKind::Int { history: history.clone(), min: -(1 << 15), max: (1 << 15) - 1 },
                                "U16_" => RefKind::Int { history: history.clone(), min: 0, max: (1 << 16) - 1 },
                                "I32_" => RefKind::Int { history: history.clone(), min: -(1 << 31), max: (1 << 31) - 1 },
                                "U32_" => RefKind::Int { history: history.clone(), min: 0, max: (1 << 32) - 1 },
                                _ => RefKind::Structure(history.clone()),
                            }
                        },
                    };
                    (*base_description.size(), FieldKind::Reference { record: base_description.clone(), to })
                } else {
                    (*base_description.size(), FieldKind::Embedded { description: base_description.clone() })
                }
            },
        };

        Ok(Self {
            name,
            since_version,
            till_version,
            size,
            kind,
        })
    }

    /// This function returns the kind of this field.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// This function returns true if this field is included in the provided structure version.
    pub fn is_in_version(&self, version: u32) -> bool {
        if let Some(since) = self.since_version {
            if version < since {
                return false;
            }
        }
        if let Some(till) = self.till_version {
            if version > till {
                return false;
            }
        }
        true
    }

    /// This function returns the name -> mask map of this field, if it's a flag field.
    pub fn bits(&self) -> Option<&BTreeMap<String, i64>> {
        match &self.kind {
            FieldKind::Int { bits, .. } if !bits.is_empty() => Some(bits),
            _ => None,
        }
    }

    //-----------------------------------------------------------------------//
    // Capability set.
    //-----------------------------------------------------------------------//

    /// This function reads the value of this field from the current position of `data`.
    pub fn read_value<R: ReadBytes>(&self, data: &mut R, check_expected_value: bool, owner: &StructureDescription) -> Result<Value> {
        match &self.kind {
            FieldKind::Tag => {
                let bytes = data.read_slice(4, false)?;
                let tag = if bytes[3] == 0 {
                    String::from_utf8_lossy(&[bytes[2], bytes[1], bytes[0]]).to_string()
                } else {
                    String::from_utf8_lossy(&[bytes[3], bytes[2], bytes[1], bytes[0]]).to_string()
                };
                Ok(Value::Tag(tag))
            },
            FieldKind::Int { int_kind, expected, .. } => {
                let value = int_kind.read(data)?;
                if check_expected_value {
                    if let Some(expected) = expected {
                        if value != *expected {
                            return Err(M3LibError::UnexpectedValue(self.variable(owner), expected.to_string(), value.to_string()));
                        }
                    }
                }
                Ok(Value::Int(value))
            },
            FieldKind::Float { expected, .. } => {
                let value = data.read_f32()?;
                if check_expected_value {
                    if let Some(expected) = expected {
                        if value != *expected {
                            return Err(M3LibError::UnexpectedValue(self.variable(owner), expected.to_string(), value.to_string()));
                        }
                    }
                }
                Ok(Value::Float(value))
            },
            FieldKind::Fixed8 { expected, .. } => {
                let value = data.read_f32_normal_from_u8()?;
                if check_expected_value {
                    if let Some(expected) = expected {
                        if value != *expected {
                            return Err(M3LibError::UnexpectedValue(self.variable(owner), expected.to_string(), value.to_string()));
                        }
                    }
                }
                Ok(Value::Float(value))
            },
            FieldKind::Bytes { expected, .. } => {
                let value = data.read_slice(self.size as usize, false)?;
                if check_expected_value {
                    if let Some(expected) = expected {
                        if &value != expected {
                            return Err(M3LibError::UnexpectedValue(self.variable(owner), format!("{expected:02X?}"), format!("{value:02X?}")));
                        }
                    }
                }
                Ok(Value::Bytes(value))
            },
            FieldKind::Embedded { description } => {
                let instance = Instance::from_bytes(description, data, check_expected_value)?;
                Ok(Value::Struct(Box::new(instance)))
            },
            FieldKind::Reference { record, .. } => {
                let instance = Instance::from_bytes(record, data, check_expected_value)?;
                let entries = instance.int("entries")? as u32;
                let index = instance.int("index")? as u32;
                let flags = if record.has_field("flags") { instance.int("flags")? as u32 } else { 0 };
                Ok(Value::Ref(Reference { entries, index, flags }))
            },
        }
    }

    /// This function writes the value of this field at the current position of `buffer`.
    pub fn write_value<W: WriteBytes>(&self, value: &Value, buffer: &mut W, owner: &StructureDescription) -> Result<()> {
        match (&self.kind, value) {
            (FieldKind::Tag, Value::Tag(tag)) => {
                let bytes = tag.as_bytes();
                if !tag.is_ascii() || (bytes.len() != 3 && bytes.len() != 4) {
                    return Err(M3LibError::EncodingTagMalformed(self.variable(owner), tag.to_owned()));
                }
                if bytes.len() == 4 {
                    buffer.write_all(&[bytes[3], bytes[2], bytes[1], bytes[0]])?;
                } else {
                    buffer.write_all(&[bytes[2], bytes[1], bytes[0], 0])?;
                }
                Ok(())
            },
            (FieldKind::Int { int_kind, .. }, Value::Int(value)) => {
                if *value < int_kind.min() || *value > int_kind.max() {
                    return Err(M3LibError::EncodingIntegerOutOfRange(self.variable(owner), *value));
                }
                int_kind.write(*value, buffer)
            },
            (FieldKind::Float { .. }, Value::Float(value)) => buffer.write_f32(*value),
            (FieldKind::Fixed8 { .. }, Value::Float(value)) => {
                let byte = ((value + 1.0) / 2.0 * 255.0).round() as i64;
                if !(0..=255).contains(&byte) {
                    return Err(M3LibError::EncodingFixed8OutOfRange(self.variable(owner), *value));
                }
                buffer.write_u8(byte as u8)
            },
            (FieldKind::Bytes { .. }, Value::Bytes(bytes)) => {
                if bytes.len() != self.size as usize {
                    return Err(M3LibError::EncodingBytesWrongLength(self.variable(owner), bytes.len(), self.size));
                }
                buffer.write_all(bytes).map_err(From::from)
            },
            (FieldKind::Embedded { .. }, Value::Struct(instance)) => instance.write(buffer),
            (FieldKind::Reference { record, .. }, Value::Ref(reference)) => {
                let mut instance = Instance::new(record);
                instance.set_int("entries", reference.entries as i64)?;
                instance.set_int("index", reference.index as i64)?;
                if record.has_field("flags") {
                    instance.set_int("flags", reference.flags as i64)?;
                }
                instance.write(buffer)
            },
            (FieldKind::Reference { .. }, Value::Pointer(_)) => Err(M3LibError::EncodingUnresolvedReference(self.variable(owner))),
            _ => Err(M3LibError::EncodingContentTypeMismatch(self.variable(owner))),
        }
    }

    /// This function returns the value a new instance gets for this field.
    pub fn default_value(&self) -> Value {
        match &self.kind {
            FieldKind::Tag => Value::Tag(String::new()),
            FieldKind::Int { default, .. } => Value::Int(*default),
            FieldKind::Float { default, .. } |
            FieldKind::Fixed8 { default, .. } => Value::Float(*default),
            FieldKind::Bytes { default, .. } => Value::Bytes(default.clone()),
            FieldKind::Embedded { description } => Value::Struct(Box::new(Instance::new(description))),
            FieldKind::Reference { to, .. } => Value::Pointer(Pointer::new(to.empty_payload().shared(), 0)),
        }
    }

    /// This function checks that `value` is structurally valid content for this field.
    pub fn validate_value(&self, value: &Value, path: &str) -> Result<()> {
        match (&self.kind, value) {
            (FieldKind::Tag, Value::Tag(tag)) => {
                if tag.len() != 4 {
                    return Err(M3LibError::ValidationNotATag(path.to_owned()));
                }
                Ok(())
            },
            (FieldKind::Tag, _) => Err(M3LibError::ValidationNotATag(path.to_owned())),
            (FieldKind::Int { int_kind, .. }, Value::Int(value)) => {
                if *value < int_kind.min() || *value > int_kind.max() {
                    return Err(M3LibError::ValidationIntegerOutOfRange(path.to_owned(), *value, int_kind.min(), int_kind.max()));
                }
                Ok(())
            },
            (FieldKind::Int { .. }, _) => Err(M3LibError::ValidationNotAnInteger(path.to_owned())),
            (FieldKind::Float { .. } | FieldKind::Fixed8 { .. }, Value::Float(_)) => Ok(()),
            (FieldKind::Float { .. } | FieldKind::Fixed8 { .. }, _) => Err(M3LibError::ValidationNotAFloat(path.to_owned())),
            (FieldKind::Bytes { .. }, Value::Bytes(bytes)) => {
                if bytes.len() != self.size as usize {
                    return Err(M3LibError::ValidationNotBytesOfSize(path.to_owned(), self.size));
                }
                Ok(())
            },
            (FieldKind::Bytes { .. }, _) => Err(M3LibError::ValidationNotBytesOfSize(path.to_owned(), self.size)),
            (FieldKind::Embedded { description }, Value::Struct(instance)) => {
                if instance.description().name() != description.name() || instance.description().version() != description.version() {
                    return Err(M3LibError::ValidationWrongInstanceType(
                        path.to_owned(),
                        description.name().to_owned(),
                        *description.version(),
                        instance.description().name().to_owned(),
                        *instance.description().version(),
                    ));
                }
                validator::validate(instance, path)
            },
            (FieldKind::Embedded { description }, _) => Err(M3LibError::ValidationWrongInstanceType(
                path.to_owned(),
                description.name().to_owned(),
                *description.version(),
                "<not an instance>".to_owned(),
                0,
            )),
            (FieldKind::Reference { to, .. }, Value::Pointer(pointer)) => to.validate_payload(&pointer.target().borrow(), path),
            (FieldKind::Reference { .. }, _) => Err(M3LibError::ValidationUnresolvedReference(path.to_owned())),
        }
    }

    /// This function walks the content of this field, allocating sections for every
    /// referenced list and substituting the in-memory content with on-disk reference records.
    pub fn introduce_index_references(&self, value: &mut Value, index_maker: &mut IndexMaker, owner: &StructureDescription) -> Result<()> {
        match &self.kind {
            FieldKind::Embedded { .. } => {
                if let Value::Struct(instance) = value {
                    instance.introduce_index_references(index_maker)?;
                }
                Ok(())
            },
            FieldKind::Reference { to, .. } => {
                let variable = self.variable(owner);
                let pointer = match value {
                    Value::Pointer(pointer) => pointer,
                    _ => return Err(M3LibError::EncodingContentTypeMismatch(variable)),
                };

                let element_description = to.content_description(&pointer.target().borrow(), &variable)?;
                let already_known = index_maker.contains(pointer.target());
                let reference = index_maker.reference_to(pointer.target(), *pointer.flags(), element_description.as_ref())?;

                // The elements of a newly allocated structure section may hold references
                // themselves. Sections the maker already knew about have been walked before.
                if !already_known && matches!(to, RefKind::Structure(_)) && reference.entries > 0 {
                    let target = pointer.target().clone();
                    let mut payload = target.try_borrow_mut().map_err(|_| M3LibError::EncodingCyclicReference(variable.to_owned()))?;
                    if let Payload::Instances(instances) = &mut *payload {
                        for instance in instances {
                            instance.introduce_index_references(index_maker)?;
                        }
                    }
                }

                *value = Value::Ref(reference);
                Ok(())
            },
            _ => Ok(()),
        }
    }

    /// This function replaces the on-disk reference record of this field with the content
    /// of the section it points to, bumping that section's reference counter.
    pub fn resolve_index_references(&self, value: &mut Value, sections: &[Section], owner: &StructureDescription) -> Result<()> {
        match &self.kind {
            FieldKind::Embedded { .. } => {
                if let Value::Struct(instance) = value {
                    instance.resolve_references(sections)?;
                }
                Ok(())
            },
            FieldKind::Reference { to, .. } => {
                let reference = match value {
                    Value::Ref(reference) => reference.clone(),

                    // Already resolved. Nothing to do.
                    _ => return Ok(()),
                };
                let variable = self.variable(owner);

                if reference.entries == 0 {
                    *value = Value::Pointer(Pointer::new(to.empty_payload().shared(), reference.flags));
                    return Ok(());
                }

                let section = sections.get(reference.index as usize)
                    .ok_or_else(|| M3LibError::DecodingReferenceOutOfBounds(variable.to_owned(), reference.index, sections.len()))?;
                section.mark_referenced();

                let entry = section.index_entry();
                if *entry.repetitions() < reference.entries {
                    return Err(M3LibError::DecodingReferenceOverLength(variable));
                }

                match to.referenced_history() {
                    Some(history) => {
                        if entry.tag() != history.name() {
                            return Err(M3LibError::DecodingReferenceTagMismatch(variable, history.name().to_owned(), entry.tag().to_owned()));
                        }
                    },
                    None => return Err(M3LibError::DecodingReferenceWithoutTarget(variable, entry.tag().to_owned())),
                }

                // Primitive buffers referenced by a shorter prefix get sliced; everything
                // else takes the whole section content, shared.
                let target = if reference.entries < *entry.repetitions() && !matches!(to, RefKind::Structure(_)) {
                    let payload = section.content().try_borrow().map_err(|_| M3LibError::DecodingReferenceOverLength(variable.to_owned()))?;
                    payload.sliced(reference.entries).shared()
                } else {
                    section.content().clone()
                };

                *value = Value::Pointer(Pointer::new(target, reference.flags));
                Ok(())
            },
            _ => Ok(()),
        }
    }

    /// Fully qualified name of this field, for error reporting.
    fn variable(&self, owner: &StructureDescription) -> String {
        format!("{}V{}.{}", owner.name(), owner.version(), self.name)
    }
}

//---------------------------------------------------------------------------//
//                      Implementation of IntKind
//---------------------------------------------------------------------------//

impl IntKind {

    /// Size in bytes of an integer of this kind.
    pub fn size(self) -> u32 {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 => 4,
        }
    }

    /// Smallest value an integer of this kind can hold.
    pub fn min(self) -> i64 {
        match self {
            Self::I8 => i8::MIN as i64,
            Self::U8 | Self::U16 | Self::U32 => 0,
            Self::I16 => i16::MIN as i64,
            Self::I32 => i32::MIN as i64,
        }
    }

    /// Biggest value an integer of this kind can hold.
    pub fn max(self) -> i64 {
        match self {
            Self::I8 => i8::MAX as i64,
            Self::U8 => u8::MAX as i64,
            Self::I16 => i16::MAX as i64,
            Self::U16 => u16::MAX as i64,
            Self::I32 => i32::MAX as i64,
            Self::U32 => u32::MAX as i64,
        }
    }

    /// This function reads an integer of this kind from `data`, widened to i64.
    pub fn read<R: ReadBytes>(self, data: &mut R) -> Result<i64> {
        Ok(match self {
            Self::I8 => data.read_i8()? as i64,
            Self::U8 => data.read_u8()? as i64,
            Self::I16 => data.read_i16()? as i64,
            Self::U16 => data.read_u16()? as i64,
            Self::I32 => data.read_i32()? as i64,
            Self::U32 => data.read_u32()? as i64,
        })
    }

    /// This function writes an integer of this kind to `buffer`.
    ///
    /// The value must already be known to be in range.
    pub fn write<W: WriteBytes>(self, value: i64, buffer: &mut W) -> Result<()> {
        match self {
            Self::I8 => buffer.write_i8(value as i8),
            Self::U8 => buffer.write_u8(value as u8),
            Self::I16 => buffer.write_i16(value as i16),
            Self::U16 => buffer.write_u16(value as u16),
            Self::I32 => buffer.write_i32(value as i32),
            Self::U32 => buffer.write_u32(value as u32),
        }
    }
}

//---------------------------------------------------------------------------//
//                      Implementation of RefKind
//---------------------------------------------------------------------------//

impl RefKind {

    /// This function returns the structure history this reference kind points to, if it has one.
    pub fn referenced_history(&self) -> Option<&Arc<StructureHistory>> {
        match self {
            Self::Unknown => None,
            Self::Char(history) |
            Self::Byte(history) |
            Self::Real(history) |
            Self::Int { history, .. } |
            Self::Structure(history) => Some(history),
        }
    }

    /// This function returns the empty content native to this reference kind.
    pub fn empty_payload(&self) -> Payload {
        match self {
            Self::Char(_) => Payload::Chars(None),
            Self::Byte(_) => Payload::Bytes(vec![]),
            Self::Real(_) => Payload::Reals(vec![]),
            Self::Int { .. } => Payload::Ints(vec![]),
            Self::Structure(_) | Self::Unknown => Payload::Instances(vec![]),
        }
    }

    /// This function returns the structure description the content of this reference
    /// serializes with, or `None` if the content is empty and produces no section.
    pub fn content_description(&self, payload: &Payload, variable: &str) -> Result<Option<Arc<StructureDescription>>> {
        match self {
            Self::Unknown => match payload {
                Payload::Instances(instances) if instances.is_empty() => Ok(None),
                _ => Err(M3LibError::EncodingUnknownReferenceNotEmpty(variable.to_owned())),
            },
            Self::Char(history) |
            Self::Byte(history) |
            Self::Real(history) |
            Self::Int { history, .. } => {
                let description = history.version(0).ok_or_else(|| M3LibError::SchemaVersionNotFound(history.name().to_owned(), 0))?;
                Ok(Some(description.clone()))
            },
            Self::Structure(_) => match payload {
                Payload::Instances(instances) => Ok(instances.first().map(|instance| instance.description().clone())),
                _ => Err(M3LibError::EncodingContentTypeMismatch(variable.to_owned())),
            },
        }
    }

    /// This function checks that `payload` is the kind of content this reference can point to.
    fn validate_payload(&self, payload: &Payload, path: &str) -> Result<()> {
        match (self, payload) {
            (Self::Unknown, Payload::Instances(instances)) if instances.is_empty() => Ok(()),
            (Self::Unknown, _) => Err(M3LibError::ValidationNotAnEmptyList(path.to_owned())),
            (Self::Char(_), Payload::Chars(_)) => Ok(()),
            (Self::Char(_), _) => Err(M3LibError::ValidationNotAString(path.to_owned())),
            (Self::Byte(_), Payload::Bytes(_)) => Ok(()),
            (Self::Byte(_), _) => Err(M3LibError::ValidationNotAByteArray(path.to_owned())),
            (Self::Real(_), Payload::Reals(_)) => Ok(()),
            (Self::Real(_), _) => Err(M3LibError::ValidationNotAFloatList(path.to_owned())),
            (Self::Int { min, max, .. }, Payload::Ints(values)) => {
                for (index, value) in values.iter().enumerate() {
                    if value < min || value > max {
                        return Err(M3LibError::ValidationIntegerOutOfRange(format!("{path}[{index}]"), *value, *min, *max));
                    }
                }
                Ok(())
            },
            (Self::Int { .. }, _) => Err(M3LibError::ValidationNotAnIntegerList(path.to_owned())),
            (Self::Structure(history), Payload::Instances(instances)) => {
                for (index, instance) in instances.iter().enumerate() {
                    let item_path = format!("{path}[{index}]");
                    if instance.description().name() != history.name() {
                        return Err(M3LibError::ValidationWrongStructureList(item_path, history.name().to_owned(), instance.description().name().to_owned()));
                    }
                    validator::validate(instance, &item_path)?;
                }
                Ok(())
            },
            (Self::Structure(_), _) => Err(M3LibError::ValidationNotAStructureList(path.to_owned())),
        }
    }
}

//---------------------------------------------------------------------------//
//                          Parse helpers
//---------------------------------------------------------------------------//

/// This function parses an optional version attribute.
fn parse_optional_u32(value: &Option<String>, variable: &str) -> Result<Option<u32>> {
    match value {
        Some(value) => value.parse::<u32>()
            .map(Some)
            .map_err(|_| M3LibError::SchemaValueNotAnInteger(variable.to_owned(), value.to_owned())),
        None => Ok(None),
    }
}

/// This function parses an integer literal, either decimal or `0x`-prefixed hex.
fn parse_int_literal(value: &str) -> Option<i64> {
    let value = value.trim();
    let (negative, value) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let parsed = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        value.parse::<i64>().ok()?
    };
    Some(if negative { -parsed } else { parsed })
}

/// This function parses an `0x`-prefixed hex string into the bytes it spells, which
/// must be exactly `size` bytes.
fn parse_hex_bytes(value: &str, size: u32, variable: &str) -> Result<Vec<u8>> {
    let digits = value.strip_prefix("0x")
        .ok_or_else(|| M3LibError::SchemaValueNotAnHexString(variable.to_owned(), value.to_owned()))?;
    if digits.len() % 2 != 0 {
        return Err(M3LibError::SchemaValueNotAnHexString(variable.to_owned(), value.to_owned()));
    }

    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for chunk in digits.as_bytes().chunks(2) {
        let chunk = std::str::from_utf8(chunk).map_err(|_| M3LibError::SchemaValueNotAnHexString(variable.to_owned(), value.to_owned()))?;
        bytes.push(u8::from_str_radix(chunk, 16).map_err(|_| M3LibError::SchemaValueNotAnHexString(variable.to_owned(), value.to_owned()))?);
    }

    if bytes.len() != size as usize {
        return Err(M3LibError::SchemaHexValueWrongLength(variable.to_owned(), value.to_owned(), size, bytes.len()));
    }

    Ok(bytes)
}

/// This function parses the `<bits>` node of a field into its name -> mask map.
fn parse_bits(raw: &RawField, variable: &str) -> Result<BTreeMap<String, i64>> {
    let mut bits = BTreeMap::new();
    if let Some(raw_bits) = &raw.bits {
        for raw_bit in &raw_bits.bits {
            let bit_name = raw_bit.name.clone().ok_or_else(|| M3LibError::SchemaBitWithoutName(variable.to_owned()))?;
            let mask = match &raw_bit.mask {
                Some(mask) => mask,
                None => return Err(M3LibError::SchemaBitWithoutMask(variable.to_owned(), bit_name)),
            };
            if !BIT_MASK.is_match(mask) {
                return Err(M3LibError::SchemaBitMaskMalformed(variable.to_owned(), bit_name, mask.to_owned()));
            }
            let mask = i64::from_str_radix(&mask[2..], 16)
                .map_err(|_| M3LibError::SchemaBitMaskMalformed(variable.to_owned(), bit_name.to_owned(), mask.to_owned()))?;
            bits.insert(bit_name, mask);
        }
    }
    Ok(bits)
}
