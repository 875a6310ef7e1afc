//---------------------------------------------------------------------------//
// Copyright (c) 2017-2024 Ismael Gutiérrez González. All rights reserved.
//
// This file is part of the M3 Model Codec (m3_lib) project,
// which can be found here: https://github.com/Frodo45127/m3_lib.
//
// This file is licensed under the MIT license, which can be found here:
// https://github.com/Frodo45127/m3_lib/blob/master/LICENSE.
//---------------------------------------------------------------------------//

//! This module contains all kind of errors used inside this crate.
//!
//! Not much to say appart of that, really.

use thiserror::Error;

/// Custom `Result` type, to always return our custom error.
pub type Result<T, E = M3LibError> = core::result::Result<T, E>;

/// Custom error type for the lib.
#[derive(Error, Debug)]
pub enum M3LibError {

    //-----------------------------------------------------------------------//
    // Schema errors.
    //-----------------------------------------------------------------------//

    #[error("There is a structure without a name attribute in the structure definitions.")]
    SchemaStructureWithoutName,

    #[error("The structure \"{0}\" has a version element without a number attribute.")]
    SchemaVersionWithoutNumber(String),

    #[error("The structure \"{0}\" has a version element without a size attribute.")]
    SchemaVersionWithoutSize(String),

    #[error("The value \"{1}\" specified for a version of the structure \"{0}\" is not an integer.")]
    SchemaVersionNotAnInteger(String, String),

    #[error("The structure \"{0}\" declares the version {1} twice.")]
    SchemaDuplicatedVersion(String, u32),

    #[error("There is a field without a name attribute in the structure \"{0}\".")]
    SchemaFieldWithoutName(String),

    #[error("The field \"{0}\" has neither a type nor a size attribute, so its amount of bytes cannot be known.")]
    SchemaFieldWithoutSize(String),

    #[error("The value \"{1}\" specified for the field \"{0}\" is not an integer.")]
    SchemaValueNotAnInteger(String, String),

    #[error("The value \"{1}\" specified for the field \"{0}\" is not a float.")]
    SchemaValueNotAFloat(String, String),

    #[error("The value \"{1}\" specified for the field \"{0}\" is not an \"0x\"-prefixed hex string.")]
    SchemaValueNotAnHexString(String, String),

    #[error("The value \"{1}\" specified for the field \"{0}\" should be {2} bytes long, but it's {3} bytes long.")]
    SchemaHexValueWrongLength(String, String, u32, usize),

    #[error("There is a bit node in the field \"{0}\" without a name attribute.")]
    SchemaBitWithoutName(String),

    #[error("The bit \"{1}\" of the field \"{0}\" has no mask attribute.")]
    SchemaBitWithoutMask(String, String),

    #[error("The bit \"{1}\" of the field \"{0}\" has an invalid mask attribute: \"{2}\".")]
    SchemaBitMaskMalformed(String, String, String),

    #[error("The structure \"{0}\" referenced by the field \"{1}\" is not defined.")]
    SchemaReferencedStructureNotDefined(String, String),

    #[error("The structure \"{0}\" has not been defined before the field \"{1}\" uses it.")]
    SchemaEmbeddedStructureNotDefined(String, String),

    #[error("Size mismatch: the structure \"{0}\" in version {1} has been specified to have size {2}, but the calculated size was {3}.")]
    SchemaStructureSizeMismatch(String, u32, u32, u32),

    #[error("The structure \"{0}\" is not defined in the loaded structure definitions.")]
    SchemaStructureNotFound(String),

    #[error("The structure \"{0}\" has no version {1} in the loaded structure definitions.")]
    SchemaVersionNotFound(String, u32),

    //-----------------------------------------------------------------------//
    // Decoding errors.
    //-----------------------------------------------------------------------//

    #[error("This file is not an M3 file: expected the tag \"MD34\" at the start of the file, but found \"{0}\".")]
    DecodingNotAnM3File(String),

    #[error("Error trying to decode the string in \"{0}\": it contains non-ASCII bytes.")]
    DecodingStringNotAscii(String),

    #[error("Error trying to decode the instances of \"{0}\": the section data is {1} bytes long, but {2} bytes are required.")]
    DecodingSectionTooShort(String, usize, usize),

    #[error("Error trying to decode an instance of \"{0}\": expected to consume {1} bytes, but consumed {2}.")]
    DecodingInstanceSizeMismatch(String, u32, u64),

    #[error("There were {0} unknown sections: {1} (see the log for more details).")]
    DecodingUnknownSections(usize, String),

    #[error("Unable to load all data: there were {0} unreferenced sections (see the log for more details).")]
    DecodingUnreferencedSections(usize),

    #[error("The reference \"{0}\" points to the section {1}, but the file only contains {2} sections.")]
    DecodingReferenceOutOfBounds(String, u32, usize),

    #[error("The reference \"{0}\" references more elements than there actually are.")]
    DecodingReferenceOverLength(String),

    #[error("Expected the reference \"{0}\" to point to \"{1}\", but it points to \"{2}\".")]
    DecodingReferenceTagMismatch(String, String, String),

    #[error("The field \"{0}\" is not marked as a reference, but it points to a section of type \"{1}\".")]
    DecodingReferenceWithoutTarget(String, String),

    #[error("The model section referenced by the header of this file is empty.")]
    DecodingModelMissing,

    #[error("Expected that \"{0}\" has always the value {1}, but it was {2}.")]
    UnexpectedValue(String, String, String),

    //-----------------------------------------------------------------------//
    // Encoding errors.
    //-----------------------------------------------------------------------//

    #[error("Section size calculation failed for \"{0}\": expected {1} bytes but {2} were written.")]
    EncodingSectionSizeMismatch(String, usize, usize),

    #[error("Section length problem: the section \"{0}\" claims to start at offset {1}, but the previous sections end at offset {2}.")]
    EncodingSectionOffsetMismatch(String, u32, u64),

    #[error("Not at the expected write position {0} after writing the sections, but at {1}.")]
    EncodingIndexOffsetMismatch(u32, u64),

    #[error("The value {1} of the field \"{0}\" does not fit in the field's integer type.")]
    EncodingIntegerOutOfRange(String, i64),

    #[error("The value {1} of the fixed8 field \"{0}\" is not in the encodable range [-1.0, 1.0].")]
    EncodingFixed8OutOfRange(String, f32),

    #[error("The tag \"{1}\" of the field \"{0}\" is not a 3 or 4 character ASCII string.")]
    EncodingTagMalformed(String, String),

    #[error("The byte array of the field \"{0}\" is {1} bytes long, but the field requires {2} bytes.")]
    EncodingBytesWrongLength(String, usize, u32),

    #[error("The reference \"{0}\" has no referenced structure type, so it must be an empty list, but it wasn't.")]
    EncodingUnknownReferenceNotEmpty(String),

    #[error("The reference \"{0}\" was not flattened into an index reference before writing.")]
    EncodingUnresolvedReference(String),

    #[error("The in-memory graph contains a cycle through \"{0}\", which cannot be laid out as sections.")]
    EncodingCyclicReference(String),

    #[error("Can't measure the length of the content of \"{0}\": it is not content of that structure type.")]
    EncodingContentTypeMismatch(String),

    //-----------------------------------------------------------------------//
    // Validation errors.
    //-----------------------------------------------------------------------//

    #[error("\"{0}\" does not have a field called \"{1}\".")]
    InstanceFieldNotFound(String, String),

    #[error("The field \"{0}\" has no bit called \"{1}\".")]
    InstanceBitNotFound(String, String),

    #[error("The field \"{0}\" is not a flag field with named bits.")]
    InstanceNotAFlagField(String),

    #[error("\"{0}\" is not an integer.")]
    ValidationNotAnInteger(String),

    #[error("\"{0}\" has value {1} which is not in range [{2}, {3}].")]
    ValidationIntegerOutOfRange(String, i64, i64, i64),

    #[error("\"{0}\" is not a float.")]
    ValidationNotAFloat(String),

    #[error("\"{0}\" is not a string with 4 characters.")]
    ValidationNotATag(String),

    #[error("\"{0}\" is not a bytes object of size {1}.")]
    ValidationNotBytesOfSize(String, u32),

    #[error("\"{0}\" is not a string.")]
    ValidationNotAString(String),

    #[error("\"{0}\" is not a byte array.")]
    ValidationNotAByteArray(String),

    #[error("\"{0}\" is not a list of floats.")]
    ValidationNotAFloatList(String),

    #[error("\"{0}\" is not a list of integers.")]
    ValidationNotAnIntegerList(String),

    #[error("\"{0}\" is not a list of structures.")]
    ValidationNotAStructureList(String),

    #[error("Expected \"{0}\" to be a list of \"{1}\" and not \"{2}\".")]
    ValidationWrongStructureList(String, String, String),

    #[error("\"{0}\" is not an empty list.")]
    ValidationNotAnEmptyList(String),

    #[error("Expected \"{0}\" to be an instance of \"{1}\" V{2}, but it is an instance of \"{3}\" V{4}.")]
    ValidationWrongInstanceType(String, String, u32, String, u32),

    #[error("\"{0}\" contains an on-disk reference record instead of resolved content.")]
    ValidationUnresolvedReference(String),

    //-----------------------------------------------------------------------//
    // Passthrough errors.
    //-----------------------------------------------------------------------//

    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Represents all other cases of `serde_xml_rs::Error`.
    #[error(transparent)]
    XmlError(#[from] serde_xml_rs::Error),
}
