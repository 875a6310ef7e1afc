//---------------------------------------------------------------------------//
// Copyright (c) 2017-2024 Ismael Gutiérrez González. All rights reserved.
//
// This file is part of the M3 Model Codec (m3_lib) project,
// which can be found here: https://github.com/Frodo45127/m3_lib.
//
// This file is licensed under the MIT license, which can be found here:
// https://github.com/Frodo45127/m3_lib/blob/master/LICENSE.
//---------------------------------------------------------------------------//

/*!
Module with all the code to interact with the structure definitions.

M3 files are not self-describing: every record type, every version of it, and every
field of every version comes from an XML document (`structures.xml` in the modding
community distributions). This module loads that document once into a [`Schema`]:

```text
Schema
 └── StructureHistory ("MODL", "BONE", "CHAR", ...)
      └── StructureDescription (one per declared version)
           └── Field (ordered, with offsets implied by the field sizes)
```

A [`StructureHistory`] knows every version of a named structure. A
[`StructureDescription`] is one concrete version: the fields visible in that version
(filtered by their `since-version`/`till-version` ranges) plus the declared byte size.
The declared size MUST match the sum of the field sizes, and the whole load aborts
with a diagnostic naming the offending structure if it doesn't.

The loaded schema is immutable and internally `Arc`-shared, so it can be reused (and
sent across threads) freely, and it is always passed explicitly to the codec: there is
no process-global registry.
!*/

use getset::Getters;
use serde_xml_rs::from_reader;

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use crate::binary::{ReadBytes, WriteBytes};
use crate::error::{M3LibError, Result};
use crate::model::{Instance, Payload};

use self::field::{Field, FieldKind};
use self::raw::RawStructures;

pub mod field;
pub mod raw;

#[cfg(test)] pub(crate) mod schema_test;

/// Structure names whose sections hold a native buffer instead of a list of records.
pub const PRIMITIVE_STRUCTURE_NAMES: [&str; 8] = ["CHAR", "U8__", "REAL", "I16_", "U16_", "I32_", "U32_", "FLAG"];

//---------------------------------------------------------------------------//
//                              Enum & Structs
//---------------------------------------------------------------------------//

/// This struct represents the whole set of structure definitions in memory, ready to
/// be used to decode/encode M3 files.
#[derive(Clone, Debug, Default)]
pub struct Schema {

    /// Structure histories, by structure name.
    structures: HashMap<String, Arc<StructureHistory>>,
}

/// This struct describes the history of a structure with a specific name: every
/// version of it the definitions declare.
#[derive(Debug, Getters)]
#[getset(get = "pub")]
pub struct StructureHistory {

    /// Name of the structure.
    name: String,

    /// Freeform description of the structure, from the definitions document.
    description: String,

    /// If the structure is one of the eight reserved primitive types.
    is_primitive: bool,

    /// The declared versions of the structure.
    #[getset(skip)]
    versions: BTreeMap<u32, Arc<StructureDescription>>,
}

/// This struct describes one concrete version of a structure: its ordered field list
/// and its validated byte size.
#[derive(Debug, Getters)]
#[getset(get = "pub")]
pub struct StructureDescription {

    /// Name of the structure.
    name: String,

    /// Version this description is for.
    version: u32,

    /// Size in bytes of one instance of this version.
    size: u32,

    /// If the structure is one of the eight reserved primitive types.
    is_primitive: bool,

    /// The fields visible in this version, in on-disk order.
    #[getset(skip)]
    fields: Vec<Field>,

    /// Field positions by field name.
    #[getset(skip)]
    name_to_field: HashMap<String, usize>,
}

//---------------------------------------------------------------------------//
//                      Implementation of Schema
//---------------------------------------------------------------------------//

impl Schema {

    /// This function loads the structure definitions from an XML file on disk.
    pub fn load(path: &Path) -> Result<Self> {
        let file = BufReader::new(File::open(path)?);
        Self::from_reader(file)
    }

    /// This function loads the structure definitions from anything readable containing
    /// their XML document.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let raw: RawStructures = from_reader(reader)?;
        Self::from_raw(&raw)
    }

    /// This function resolves the raw XML document into a validated schema.
    ///
    /// Structures are processed in document order, and may only use structures defined
    /// before themselves. Any malformed or missing attribute aborts the load.
    fn from_raw(raw: &RawStructures) -> Result<Self> {
        let mut structures: HashMap<String, Arc<StructureHistory>> = HashMap::new();

        for raw_structure in &raw.structures {
            let name = raw_structure.name.clone().ok_or(M3LibError::SchemaStructureWithoutName)?;

            let mut version_to_size: BTreeMap<u32, u32> = BTreeMap::new();
            if let Some(raw_versions) = &raw_structure.versions {
                for raw_version in &raw_versions.versions {
                    let number = match &raw_version.number {
                        Some(value) => value.parse::<u32>().map_err(|_| M3LibError::SchemaVersionNotAnInteger(name.to_owned(), value.to_owned()))?,
                        None => return Err(M3LibError::SchemaVersionWithoutNumber(name)),
                    };
                    let size = match &raw_version.size {
                        Some(value) => value.parse::<u32>().map_err(|_| M3LibError::SchemaVersionNotAnInteger(name.to_owned(), value.to_owned()))?,
                        None => return Err(M3LibError::SchemaVersionWithoutSize(name)),
                    };
                    if version_to_size.insert(number, size).is_some() {
                        return Err(M3LibError::SchemaDuplicatedVersion(name, number));
                    }
                }
            }

            let mut all_fields = vec![];
            if let Some(raw_fields) = &raw_structure.fields {
                for raw_field in &raw_fields.fields {
                    all_fields.push(Field::from_raw(raw_field, &structures, &name)?);
                }
            }

            let is_primitive = PRIMITIVE_STRUCTURE_NAMES.contains(&name.as_str());

            let mut versions = BTreeMap::new();
            for (version, size) in &version_to_size {
                let fields = all_fields.iter()
                    .filter(|field| field.is_in_version(*version))
                    .cloned()
                    .collect::<Vec<_>>();
                let description = StructureDescription::new(&name, *version, fields, *size, is_primitive)?;
                versions.insert(*version, Arc::new(description));
            }

            let history = StructureHistory {
                name: name.to_owned(),
                description: raw_structure.description.clone().unwrap_or_default(),
                is_primitive,
                versions,
            };
            structures.insert(name, Arc::new(history));
        }

        Ok(Self {
            structures,
        })
    }

    /// This function returns the history of the structure with the provided name, if defined.
    pub fn structure(&self, name: &str) -> Option<&Arc<StructureHistory>> {
        self.structures.get(name)
    }

    /// This function returns the description of a specific version of a structure,
    /// erroring out if either the structure or the version is not defined.
    pub fn description(&self, name: &str, version: u32) -> Result<Arc<StructureDescription>> {
        let history = self.structures.get(name).ok_or_else(|| M3LibError::SchemaStructureNotFound(name.to_owned()))?;
        history.version(version)
            .cloned()
            .ok_or_else(|| M3LibError::SchemaVersionNotFound(name.to_owned(), version))
    }
}

//---------------------------------------------------------------------------//
//                  Implementation of StructureHistory
//---------------------------------------------------------------------------//

impl StructureHistory {

    /// This function returns the description of the provided version of this structure.
    pub fn version(&self, version: u32) -> Option<&Arc<StructureDescription>> {
        self.versions.get(&version)
    }

    /// This function returns the description of the newest declared version of this structure.
    pub fn newest_version(&self) -> Option<&Arc<StructureDescription>> {
        self.versions.values().next_back()
    }
}

//---------------------------------------------------------------------------//
//                Implementation of StructureDescription
//---------------------------------------------------------------------------//

impl StructureDescription {

    /// This function builds the description of one version of a structure, validating
    /// its declared size against the sum of its field sizes.
    fn new(name: &str, version: u32, fields: Vec<Field>, size: u32, is_primitive: bool) -> Result<Self> {
        let calculated_size = fields.iter().map(|field| *field.size()).sum::<u32>();
        if calculated_size != size {
            dump_offsets(name, version, &fields);
            return Err(M3LibError::SchemaStructureSizeMismatch(name.to_owned(), version, size, calculated_size));
        }

        let name_to_field = fields.iter()
            .enumerate()
            .map(|(index, field)| (field.name().to_owned(), index))
            .collect::<HashMap<_, _>>();

        Ok(Self {
            name: name.to_owned(),
            version,
            size,
            is_primitive,
            fields,
            name_to_field,
        })
    }

    /// This function returns the fields of this structure version, in on-disk order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// This function returns if this structure version has a field with the provided name.
    pub fn has_field(&self, field_name: &str) -> bool {
        self.name_to_field.contains_key(field_name)
    }

    /// This function returns the position of the field with the provided name.
    pub fn field_index(&self, field_name: &str) -> Option<usize> {
        self.name_to_field.get(field_name).copied()
    }

    /// This function returns the field with the provided name.
    pub fn field(&self, field_name: &str) -> Option<&Field> {
        self.field_index(field_name).map(|index| &self.fields[index])
    }

    /// This function logs the offset of every field of this structure version, to help
    /// debugging layout problems.
    pub fn dump_offsets(&self) {
        dump_offsets(&self.name, self.version, &self.fields);
    }

    /// This function decodes the content of a section with `count` repetitions of the
    /// provided structure from its raw bytes.
    ///
    /// For primitive structures the content is the native buffer; for everything else,
    /// a list of instances.
    pub fn create_instances(description: &Arc<Self>, buffer: &[u8], count: u32, check_expected_value: bool) -> Result<Payload> {
        let count = count as usize;
        let this = description.as_ref();
        if this.is_primitive {
            match this.name.as_str() {
                "CHAR" => {
                    if count == 0 {
                        return Ok(Payload::Chars(None));
                    }
                    if buffer.len() < count {
                        return Err(M3LibError::DecodingSectionTooShort(this.name.to_owned(), buffer.len(), count));
                    }

                    // The last counted byte is the NUL terminator.
                    let bytes = &buffer[..count - 1];
                    if !bytes.is_ascii() {
                        return Err(M3LibError::DecodingStringNotAscii(format!("{}V{}", this.name, this.version)));
                    }
                    return Ok(Payload::Chars(Some(String::from_utf8_lossy(bytes).to_string())));
                },
                "U8__" => {
                    if buffer.len() < count {
                        return Err(M3LibError::DecodingSectionTooShort(this.name.to_owned(), buffer.len(), count));
                    }
                    return Ok(Payload::Bytes(buffer[..count].to_vec()));
                },
                _ => {
                    let required = count * this.size as usize;
                    if buffer.len() < required {
                        return Err(M3LibError::DecodingSectionTooShort(this.name.to_owned(), buffer.len(), required));
                    }

                    let mut data = Cursor::new(&buffer[..required]);
                    match this.fields.first().map(Field::kind) {
                        Some(FieldKind::Int { int_kind, .. }) => {
                            let mut values = Vec::with_capacity(count);
                            for _ in 0..count {
                                values.push(int_kind.read(&mut data)?);
                            }
                            return Ok(Payload::Ints(values));
                        },
                        Some(FieldKind::Float { .. }) => {
                            let mut values = Vec::with_capacity(count);
                            for _ in 0..count {
                                values.push(data.read_f32()?);
                            }
                            return Ok(Payload::Reals(values));
                        },

                        // A primitive defined with a non-numeric field. Decode it like
                        // a regular structure so nothing is lost.
                        _ => {},
                    }
                },
            }
        }

        let mut data = Cursor::new(buffer);
        let mut instances = Vec::with_capacity(count);
        for _ in 0..count {
            instances.push(Instance::from_bytes(description, &mut data, check_expected_value)?);
        }
        Ok(Payload::Instances(instances))
    }

    /// This function counts how many on-disk repetitions the provided content needs.
    ///
    /// For strings this includes the NUL terminator, and a never-set string counts zero.
    pub fn count_instances(&self, payload: &Payload) -> Result<u32> {
        match payload {
            Payload::Chars(content) if self.name == "CHAR" => Ok(content.as_ref().map_or(0, |string| string.len() as u32 + 1)),
            Payload::Bytes(bytes) if self.name == "U8__" => Ok(bytes.len() as u32),
            Payload::Reals(values) => Ok(values.len() as u32),
            Payload::Ints(values) => Ok(values.len() as u32),
            Payload::Instances(instances) if !self.is_primitive => Ok(instances.len() as u32),
            _ => Err(M3LibError::EncodingContentTypeMismatch(self.name.to_owned())),
        }
    }

    /// This function returns the minimum amount of bytes the provided content takes on
    /// disk, before section padding.
    pub fn bytes_required(&self, payload: &Payload) -> Result<u32> {
        if self.name == "CHAR" {
            if let Payload::Chars(content) = payload {
                return Ok(content.as_ref().map_or(0, |string| string.len() as u32 + 1));
            }
        }
        Ok(self.size * self.count_instances(payload)?)
    }

    /// This function encodes the provided content into `buffer`.
    pub fn write_instances<W: WriteBytes>(&self, payload: &Payload, buffer: &mut W) -> Result<()> {
        match payload {
            Payload::Chars(content) if self.name == "CHAR" => {
                if let Some(string) = content {
                    buffer.write_string_ascii(string)?;
                    buffer.write_u8(0)?;
                }
                Ok(())
            },
            Payload::Bytes(bytes) if self.name == "U8__" => buffer.write_all(bytes).map_err(From::from),
            Payload::Ints(values) => match self.fields.first().map(Field::kind) {
                Some(FieldKind::Int { int_kind, .. }) => {
                    for value in values {
                        if *value < int_kind.min() || *value > int_kind.max() {
                            return Err(M3LibError::EncodingIntegerOutOfRange(self.name.to_owned(), *value));
                        }
                        int_kind.write(*value, buffer)?;
                    }
                    Ok(())
                },
                _ => Err(M3LibError::EncodingContentTypeMismatch(self.name.to_owned())),
            },
            Payload::Reals(values) => match self.fields.first().map(Field::kind) {
                Some(FieldKind::Float { .. }) => {
                    for value in values {
                        buffer.write_f32(*value)?;
                    }
                    Ok(())
                },
                _ => Err(M3LibError::EncodingContentTypeMismatch(self.name.to_owned())),
            },
            Payload::Instances(instances) if !self.is_primitive => {
                for instance in instances {
                    instance.write(buffer)?;
                }
                Ok(())
            },
            _ => Err(M3LibError::EncodingContentTypeMismatch(self.name.to_owned())),
        }
    }
}

/// This function logs the offset of every field of a structure version.
fn dump_offsets(name: &str, version: u32, fields: &[Field]) {
    log::error!("Offsets of {name} in version {version}:");
    let mut offset = 0;
    for field in fields {
        log::error!("{offset}: {}", field.name());
        offset += field.size();
    }
}
