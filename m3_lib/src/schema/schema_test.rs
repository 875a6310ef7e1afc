//---------------------------------------------------------------------------//
// Copyright (c) 2017-2024 Ismael Gutiérrez González. All rights reserved.
//
// This file is part of the M3 Model Codec (m3_lib) project,
// which can be found here: https://github.com/Frodo45127/m3_lib.
//
// This file is licensed under the MIT license, which can be found here:
// https://github.com/Frodo45127/m3_lib/blob/master/LICENSE.
//---------------------------------------------------------------------------//

//! Module containing tests for the schema registry, plus the structure definitions
//! the rest of the test suite decodes/encodes against.

use super::*;
use super::field::{FieldKind, IntKind, RefKind};

/// A miniature but complete set of structure definitions: the eight primitives, the
/// reference records, the index entry, and a small model with one of everything.
pub(crate) const TEST_SCHEMA: &str = r#"
<structures>
    <structure name="CHAR">
        <description>ASCII string, NUL-terminated on disk.</description>
        <versions>
            <version number="0" size="1"/>
        </versions>
        <fields>
            <field name="character" size="1"/>
        </fields>
    </structure>
    <structure name="U8__">
        <versions>
            <version number="0" size="1"/>
        </versions>
        <fields>
            <field name="value" type="uint8"/>
        </fields>
    </structure>
    <structure name="REAL">
        <versions>
            <version number="0" size="4"/>
        </versions>
        <fields>
            <field name="value" type="float"/>
        </fields>
    </structure>
    <structure name="I16_">
        <versions>
            <version number="0" size="2"/>
        </versions>
        <fields>
            <field name="value" type="int16"/>
        </fields>
    </structure>
    <structure name="U16_">
        <versions>
            <version number="0" size="2"/>
        </versions>
        <fields>
            <field name="value" type="uint16"/>
        </fields>
    </structure>
    <structure name="I32_">
        <versions>
            <version number="0" size="4"/>
        </versions>
        <fields>
            <field name="value" type="int32"/>
        </fields>
    </structure>
    <structure name="U32_">
        <versions>
            <version number="0" size="4"/>
        </versions>
        <fields>
            <field name="value" type="uint32"/>
        </fields>
    </structure>
    <structure name="FLAG">
        <versions>
            <version number="0" size="4"/>
        </versions>
        <fields>
            <field name="value" type="uint32"/>
        </fields>
    </structure>
    <structure name="Reference">
        <description>Points to a section of the file.</description>
        <versions>
            <version number="0" size="12"/>
        </versions>
        <fields>
            <field name="entries" type="uint32"/>
            <field name="index" type="uint32"/>
            <field name="flags" type="uint32"/>
        </fields>
    </structure>
    <structure name="SmallReference">
        <versions>
            <version number="0" size="8"/>
        </versions>
        <fields>
            <field name="entries" type="uint32"/>
            <field name="index" type="uint32"/>
        </fields>
    </structure>
    <structure name="MD34IndexEntry">
        <versions>
            <version number="0" size="16"/>
        </versions>
        <fields>
            <field name="tag" type="tag"/>
            <field name="offset" type="uint32"/>
            <field name="repetitions" type="uint32"/>
            <field name="version" type="uint32"/>
        </fields>
    </structure>
    <structure name="VEC3">
        <versions>
            <version number="0" size="12"/>
        </versions>
        <fields>
            <field name="x" type="float"/>
            <field name="y" type="float"/>
            <field name="z" type="float"/>
        </fields>
    </structure>
    <structure name="BONE">
        <versions>
            <version number="0" size="24"/>
        </versions>
        <fields>
            <field name="name" type="Reference" refTo="CHAR"/>
            <field name="flags" type="uint32">
                <bits>
                    <bit name="inheritTranslation" mask="0x1"/>
                    <bit name="inheritScale" mask="0x2"/>
                    <bit name="inheritRotation" mask="0x4"/>
                </bits>
            </field>
            <field name="scale" type="float" default-value="1.0"/>
            <field name="opacity" type="fixed8" default-value="-1.0"/>
            <field name="padding" size="3" expected-value="0x000000"/>
        </fields>
    </structure>
    <structure name="MODL">
        <description>Root record of a model.</description>
        <versions>
            <version number="23" size="96"/>
            <version number="24" size="98"/>
        </versions>
        <fields>
            <field name="modelType" type="uint32" default-value="23"/>
            <field name="flags" type="uint32">
                <bits>
                    <bit name="hasMesh" mask="0x100"/>
                    <bit name="hasVertices" mask="0x20000"/>
                </bits>
            </field>
            <field name="name" type="Reference" refTo="CHAR"/>
            <field name="bones" type="Reference" refTo="BONE"/>
            <field name="vertexData" type="Reference" refTo="U8__"/>
            <field name="floats" type="Reference" refTo="REAL"/>
            <field name="indices" type="Reference" refTo="U16_"/>
            <field name="extra" type="Reference"/>
            <field name="center" type="VEC3"/>
            <field name="tightness" type="fixed8" default-value="1.0"/>
            <field name="pad" size="3"/>
            <field name="newField" type="uint16" since-version="24"/>
        </fields>
    </structure>
    <structure name="MD34">
        <description>Header of the file.</description>
        <versions>
            <version number="11" size="24"/>
        </versions>
        <fields>
            <field name="tag" type="tag"/>
            <field name="indexOffset" type="uint32"/>
            <field name="indexSize" type="uint32"/>
            <field name="model" type="Reference" refTo="MODL"/>
        </fields>
    </structure>
</structures>
"#;

/// This function loads the test definitions above.
pub(crate) fn test_schema() -> Schema {
    Schema::from_reader(TEST_SCHEMA.as_bytes()).unwrap()
}

#[test]
fn test_schema_load() {
    let schema = test_schema();

    let modl = schema.structure("MODL").unwrap();
    assert_eq!(modl.description(), "Root record of a model.");
    assert!(!*modl.is_primitive());

    let v23 = modl.version(23).unwrap();
    assert_eq!(*v23.size(), 96);
    assert!(!v23.has_field("newField"));

    let v24 = modl.version(24).unwrap();
    assert_eq!(*v24.size(), 98);
    assert!(v24.has_field("newField"));

    assert_eq!(*modl.newest_version().unwrap().version(), 24);

    assert!(*schema.structure("CHAR").unwrap().is_primitive());
    assert!(*schema.structure("FLAG").unwrap().is_primitive());

    // Sub-structure sizes drive the reference field sizes.
    assert_eq!(*schema.description("Reference", 0).unwrap().size(), 12);
    assert_eq!(*schema.description("SmallReference", 0).unwrap().size(), 8);
    assert_eq!(*schema.description("MD34IndexEntry", 0).unwrap().size(), 16);
}

#[test]
fn test_schema_field_kinds() {
    let schema = test_schema();
    let modl = schema.description("MODL", 23).unwrap();

    match modl.field("name").unwrap().kind() {
        FieldKind::Reference { record, to: RefKind::Char(_) } => assert_eq!(record.name(), "Reference"),
        kind => panic!("name resolved to {kind:?}"),
    }
    assert!(matches!(modl.field("bones").unwrap().kind(), FieldKind::Reference { to: RefKind::Structure(_), .. }));
    assert!(matches!(modl.field("vertexData").unwrap().kind(), FieldKind::Reference { to: RefKind::Byte(_), .. }));
    assert!(matches!(modl.field("floats").unwrap().kind(), FieldKind::Reference { to: RefKind::Real(_), .. }));
    assert!(matches!(modl.field("extra").unwrap().kind(), FieldKind::Reference { to: RefKind::Unknown, .. }));

    match modl.field("indices").unwrap().kind() {
        FieldKind::Reference { to: RefKind::Int { history, min, max }, .. } => {
            assert_eq!(history.name(), "U16_");
            assert_eq!(*min, 0);
            assert_eq!(*max, 65535);
        },
        kind => panic!("indices resolved to {kind:?}"),
    }

    match modl.field("center").unwrap().kind() {
        FieldKind::Embedded { description } => {
            assert_eq!(description.name(), "VEC3");
            assert_eq!(*modl.field("center").unwrap().size(), 12);
        },
        kind => panic!("center resolved to {kind:?}"),
    }

    match modl.field("modelType").unwrap().kind() {
        FieldKind::Int { int_kind, default, .. } => {
            assert_eq!(*int_kind, IntKind::U32);
            assert_eq!(*default, 23);
        },
        kind => panic!("modelType resolved to {kind:?}"),
    }

    // Defaults fall back to the expected value when only that one is declared.
    let bone = schema.description("BONE", 0).unwrap();
    match bone.field("padding").unwrap().kind() {
        FieldKind::Bytes { default, expected } => {
            assert_eq!(default, &vec![0, 0, 0]);
            assert_eq!(expected, &Some(vec![0, 0, 0]));
        },
        kind => panic!("padding resolved to {kind:?}"),
    }

    let bits = modl.field("flags").unwrap().bits().unwrap();
    assert_eq!(bits.get("hasMesh"), Some(&0x100));
    assert_eq!(bits.get("hasVertices"), Some(&0x20000));
}

#[test]
fn test_schema_small_reference_field() {
    let definitions = r#"
    <structures>
        <structure name="REAL">
            <versions><version number="0" size="4"/></versions>
            <fields><field name="value" type="float"/></fields>
        </structure>
        <structure name="SmallReference">
            <versions><version number="0" size="8"/></versions>
            <fields>
                <field name="entries" type="uint32"/>
                <field name="index" type="uint32"/>
            </fields>
        </structure>
        <structure name="TEST">
            <versions><version number="0" size="8"/></versions>
            <fields><field name="values" type="SmallReference" refTo="REAL"/></fields>
        </structure>
    </structures>
    "#;
    let schema = Schema::from_reader(definitions.as_bytes()).unwrap();
    let test = schema.description("TEST", 0).unwrap();
    assert_eq!(*test.field("values").unwrap().size(), 8);
    assert!(matches!(test.field("values").unwrap().kind(), FieldKind::Reference { to: RefKind::Real(_), .. }));
}

#[test]
fn test_schema_version_filtering_changes_size() {
    // A field with a till-version must disappear from newer versions.
    let definitions = r#"
    <structures>
        <structure name="TEST">
            <versions>
                <version number="0" size="8"/>
                <version number="1" size="4"/>
            </versions>
            <fields>
                <field name="old" type="uint32" till-version="0"/>
                <field name="kept" type="uint32"/>
            </fields>
        </structure>
    </structures>
    "#;
    let schema = Schema::from_reader(definitions.as_bytes()).unwrap();
    assert!(schema.description("TEST", 0).unwrap().has_field("old"));
    assert!(!schema.description("TEST", 1).unwrap().has_field("old"));
}

#[test]
fn test_schema_size_mismatch_fails() {
    let definitions = r#"
    <structures>
        <structure name="TEST">
            <versions><version number="0" size="5"/></versions>
            <fields><field name="value" type="uint32"/></fields>
        </structure>
    </structures>
    "#;
    let result = Schema::from_reader(definitions.as_bytes());
    assert!(matches!(result, Err(M3LibError::SchemaStructureSizeMismatch(name, 0, 5, 4)) if name == "TEST"));
}

#[test]
fn test_schema_duplicated_version_fails() {
    let definitions = r#"
    <structures>
        <structure name="TEST">
            <versions>
                <version number="0" size="4"/>
                <version number="0" size="4"/>
            </versions>
            <fields><field name="value" type="uint32"/></fields>
        </structure>
    </structures>
    "#;
    let result = Schema::from_reader(definitions.as_bytes());
    assert!(matches!(result, Err(M3LibError::SchemaDuplicatedVersion(name, 0)) if name == "TEST"));
}

#[test]
fn test_schema_invalid_mask_fails() {
    let definitions = r#"
    <structures>
        <structure name="TEST">
            <versions><version number="0" size="4"/></versions>
            <fields>
                <field name="flags" type="uint32">
                    <bits><bit name="broken" mask="17"/></bits>
                </field>
            </fields>
        </structure>
    </structures>
    "#;
    let result = Schema::from_reader(definitions.as_bytes());
    assert!(matches!(result, Err(M3LibError::SchemaBitMaskMalformed(_, _, _))));
}

#[test]
fn test_schema_unresolved_ref_to_fails() {
    let definitions = r#"
    <structures>
        <structure name="Reference">
            <versions><version number="0" size="12"/></versions>
            <fields>
                <field name="entries" type="uint32"/>
                <field name="index" type="uint32"/>
                <field name="flags" type="uint32"/>
            </fields>
        </structure>
        <structure name="TEST">
            <versions><version number="0" size="12"/></versions>
            <fields><field name="missing" type="Reference" refTo="BONE"/></fields>
        </structure>
    </structures>
    "#;
    let result = Schema::from_reader(definitions.as_bytes());
    assert!(matches!(result, Err(M3LibError::SchemaReferencedStructureNotDefined(name, _)) if name == "BONE"));
}

#[test]
fn test_schema_forward_embedded_structure_fails() {
    let definitions = r#"
    <structures>
        <structure name="TEST">
            <versions><version number="0" size="12"/></versions>
            <fields><field name="position" type="VEC3"/></fields>
        </structure>
        <structure name="VEC3">
            <versions><version number="0" size="12"/></versions>
            <fields>
                <field name="x" type="float"/>
                <field name="y" type="float"/>
                <field name="z" type="float"/>
            </fields>
        </structure>
    </structures>
    "#;
    let result = Schema::from_reader(definitions.as_bytes());
    assert!(matches!(result, Err(M3LibError::SchemaEmbeddedStructureNotDefined(name, _)) if name == "VEC3"));
}

#[test]
fn test_schema_malformed_expected_value_fails() {
    let definitions = r#"
    <structures>
        <structure name="TEST">
            <versions><version number="0" size="4"/></versions>
            <fields><field name="value" type="uint32" expected-value="banana"/></fields>
        </structure>
    </structures>
    "#;
    let result = Schema::from_reader(definitions.as_bytes());
    assert!(matches!(result, Err(M3LibError::SchemaValueNotAnInteger(_, value)) if value == "banana"));
}

#[test]
fn test_schema_structure_without_name_fails() {
    let definitions = r#"
    <structures>
        <structure>
            <versions><version number="0" size="4"/></versions>
            <fields><field name="value" type="uint32"/></fields>
        </structure>
    </structures>
    "#;
    let result = Schema::from_reader(definitions.as_bytes());
    assert!(matches!(result, Err(M3LibError::SchemaStructureWithoutName)));
}

#[test]
fn test_schema_hex_literals() {
    let definitions = r#"
    <structures>
        <structure name="TEST">
            <versions><version number="0" size="4"/></versions>
            <fields><field name="value" type="uint32" expected-value="0x20" default-value="48"/></fields>
        </structure>
    </structures>
    "#;
    let schema = Schema::from_reader(definitions.as_bytes()).unwrap();
    match schema.description("TEST", 0).unwrap().field("value").unwrap().kind() {
        FieldKind::Int { default, expected, .. } => {
            assert_eq!(*expected, Some(0x20));
            assert_eq!(*default, 48);
        },
        kind => panic!("value resolved to {kind:?}"),
    }
}
