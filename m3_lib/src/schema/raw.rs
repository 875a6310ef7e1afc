//---------------------------------------------------------------------------//
// Copyright (c) 2017-2024 Ismael Gutiérrez González. All rights reserved.
//
// This file is part of the M3 Model Codec (m3_lib) project,
// which can be found here: https://github.com/Frodo45127/m3_lib.
//
// This file is licensed under the MIT license, which can be found here:
// https://github.com/Frodo45127/m3_lib/blob/master/LICENSE.
//---------------------------------------------------------------------------//

//! Types the XML structure definitions are deserialized into, before validation.
//!
//! These mirror the document verbatim: every attribute lands as an optional string, and
//! the [`Schema`](crate::schema::Schema) builder is the one that parses, validates and
//! reports proper errors for them. Unknown attributes are ignored by design.

use serde_derive::Deserialize;

//---------------------------------------------------------------------------//
//                              Enum & Structs
//---------------------------------------------------------------------------//

/// This is the raw equivalent of the whole `<structures>` document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename = "structures")]
pub struct RawStructures {

    /// Structure definitions, in document order. Order matters: a structure may only
    /// use structures defined before itself.
    #[serde(rename = "structure", default)]
    pub structures: Vec<RawStructure>,
}

/// This is the raw equivalent of a `<structure>` node.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawStructure {

    /// Name of the structure. Four characters for structures that can act as sections.
    pub name: Option<String>,

    /// Freeform description of what the structure is for.
    pub description: Option<String>,

    /// The `<versions>` node.
    pub versions: Option<RawVersions>,

    /// The `<fields>` node.
    pub fields: Option<RawFields>,
}

/// This is the raw equivalent of a `<versions>` node.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawVersions {
    #[serde(rename = "version", default)]
    pub versions: Vec<RawVersion>,
}

/// This is the raw equivalent of a `<version>` node.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawVersion {

    /// Version number.
    pub number: Option<String>,

    /// Size in bytes of an instance of this version of the structure.
    pub size: Option<String>,
}

/// This is the raw equivalent of a `<fields>` node.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawFields {
    #[serde(rename = "field", default)]
    pub fields: Vec<RawField>,
}

/// This is the raw equivalent of a `<field>` node.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawField {

    /// Name of the field.
    pub name: Option<String>,

    /// Type of the field. Absent for opaque byte blobs.
    #[serde(rename = "type")]
    pub field_type: Option<String>,

    /// For reference fields, the name of the structure the reference points to.
    #[serde(rename = "refTo")]
    pub ref_to: Option<String>,

    /// Size in bytes. Only used when `type` is absent.
    pub size: Option<String>,

    /// Value this field is expected to always have on disk.
    #[serde(rename = "expected-value")]
    pub expected_value: Option<String>,

    /// Value new instances get for this field.
    #[serde(rename = "default-value")]
    pub default_value: Option<String>,

    /// First structure version that includes this field. Open-ended if absent.
    #[serde(rename = "since-version")]
    pub since_version: Option<String>,

    /// Last structure version that includes this field. Open-ended if absent.
    #[serde(rename = "till-version")]
    pub till_version: Option<String>,

    /// The `<bits>` node, for flag fields with named bits.
    pub bits: Option<RawBits>,
}

/// This is the raw equivalent of a `<bits>` node.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawBits {
    #[serde(rename = "bit", default)]
    pub bits: Vec<RawBit>,
}

/// This is the raw equivalent of a `<bit>` node.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawBit {

    /// Name of the bit.
    pub name: Option<String>,

    /// Mask of the bit, as an `0x`-prefixed literal.
    pub mask: Option<String>,
}
