//---------------------------------------------------------------------------//
// Copyright (c) 2017-2024 Ismael Gutiérrez González. All rights reserved.
//
// This file is part of the M3 Model Codec (m3_lib) project,
// which can be found here: https://github.com/Frodo45127/m3_lib.
//
// This file is licensed under the MIT license, which can be found here:
// https://github.com/Frodo45127/m3_lib/blob/master/LICENSE.
//---------------------------------------------------------------------------//

//! Module containing tests for decoding/encoding instances.

use float_eq::assert_float_eq;

use std::io::Cursor;

use crate::error::M3LibError;
use crate::schema::schema_test::test_schema;
use crate::validator;

use super::*;

#[test]
fn test_default_instance() {
    let schema = test_schema();
    let description = schema.description("MODL", 23).unwrap();
    let model = Instance::new(&description);

    assert_eq!(model.int("modelType").unwrap(), 23);
    assert_eq!(model.int("flags").unwrap(), 0);
    assert_eq!(*model.pointer("name").unwrap().target().borrow(), Payload::Chars(None));
    assert_eq!(*model.pointer("bones").unwrap().target().borrow(), Payload::Instances(vec![]));
    assert_eq!(*model.pointer("vertexData").unwrap().target().borrow(), Payload::Bytes(vec![]));
    assert_eq!(*model.pointer("floats").unwrap().target().borrow(), Payload::Reals(vec![]));
    assert_eq!(*model.pointer("indices").unwrap().target().borrow(), Payload::Ints(vec![]));

    // Defaults must pass validation as-is.
    validator::validate(&model, "model").unwrap();

    // The embedded structure defaults recursively.
    match model.value("center").unwrap() {
        Value::Struct(center) => assert_float_eq!(center.float("x").unwrap(), 0.0, abs <= 0.0),
        value => panic!("center defaulted to {value:?}"),
    }
}

#[test]
fn test_tag_field_endianness() {
    let schema = test_schema();
    let description = schema.description("MD34IndexEntry", 0).unwrap();

    let mut entry = Instance::new(&description);
    entry.set_tag("tag", "MD34").unwrap();
    entry.set_int("offset", 1).unwrap();
    entry.set_int("repetitions", 2).unwrap();
    entry.set_int("version", 3).unwrap();

    let mut data = vec![];
    entry.write(&mut data).unwrap();
    assert_eq!(&data[..4], &[0x34, 0x33, 0x44, 0x4D]);

    let read_back = Instance::from_bytes(&description, &mut Cursor::new(&data), true).unwrap();
    assert_eq!(read_back.tag("tag").unwrap(), "MD34");
    assert_eq!(read_back, entry);

    // 3-char tags get reversed too, with a trailing NUL.
    entry.set_tag("tag", "DIV").unwrap();
    let mut data = vec![];
    entry.write(&mut data).unwrap();
    assert_eq!(&data[..4], &[0x56, 0x49, 0x44, 0x00]);

    let read_back = Instance::from_bytes(&description, &mut Cursor::new(&data), true).unwrap();
    assert_eq!(read_back.tag("tag").unwrap(), "DIV");
}

#[test]
fn test_fixed8_boundaries() {
    let schema = test_schema();
    let description = schema.description("BONE", 0).unwrap();

    // name (12 bytes), flags (4), scale (4), opacity (1), padding (3).
    let mut data = vec![0; 12];
    data.extend_from_slice(&[0, 0, 0, 0]);
    data.extend_from_slice(&1.0f32.to_le_bytes());
    data.push(0x00);
    data.extend_from_slice(&[0, 0, 0]);

    let bone = Instance::from_bytes(&description, &mut Cursor::new(&data), true).unwrap();
    assert_float_eq!(bone.float("opacity").unwrap(), -1.0, abs <= 0.0);
    assert_float_eq!(bone.float("scale").unwrap(), 1.0, abs <= 0.0);

    let mut written = vec![];
    bone.write(&mut written).unwrap();
    assert_eq!(written, data);

    // 0xFF maps to +1.0, 0x80 to barely above zero.
    data[20] = 0xFF;
    let bone = Instance::from_bytes(&description, &mut Cursor::new(&data), true).unwrap();
    assert_float_eq!(bone.float("opacity").unwrap(), 1.0, abs <= 0.0);

    data[20] = 0x80;
    let bone = Instance::from_bytes(&description, &mut Cursor::new(&data), true).unwrap();
    assert_float_eq!(bone.float("opacity").unwrap(), 0.0039, abs <= 0.0001);

    let mut written = vec![];
    bone.write(&mut written).unwrap();
    assert_eq!(written[20], 0x80);
}

#[test]
fn test_expected_value_check() {
    let schema = test_schema();
    let description = schema.description("BONE", 0).unwrap();

    let mut data = vec![0; 24];
    data[21] = 1;
    data[22] = 2;
    data[23] = 3;

    // The padding of a BONE is pinned to zeros by the definitions.
    let result = Instance::from_bytes(&description, &mut Cursor::new(&data), true);
    assert!(matches!(result, Err(M3LibError::UnexpectedValue(variable, _, _)) if variable == "BONEV0.padding"));

    // Without the check the bytes pass through untouched.
    let bone = Instance::from_bytes(&description, &mut Cursor::new(&data), false).unwrap();
    let mut written = vec![];
    bone.write(&mut written).unwrap();
    assert_eq!(written, data);
}

#[test]
fn test_named_bits() {
    let schema = test_schema();
    let description = schema.description("MODL", 23).unwrap();
    let mut model = Instance::new(&description);

    model.set_named_bit("flags", "hasMesh", true).unwrap();
    assert!(model.named_bit("flags", "hasMesh").unwrap());
    assert!(!model.named_bit("flags", "hasVertices").unwrap());
    assert_eq!(model.int("flags").unwrap(), 0x100);

    // Setting a bit to its current state changes nothing.
    model.set_named_bit("flags", "hasMesh", true).unwrap();
    assert_eq!(model.int("flags").unwrap(), 0x100);

    model.set_named_bit("flags", "hasVertices", true).unwrap();
    assert_eq!(model.int("flags").unwrap(), 0x20100);

    model.set_named_bit("flags", "hasMesh", false).unwrap();
    assert!(!model.named_bit("flags", "hasMesh").unwrap());
    assert_eq!(model.int("flags").unwrap(), 0x20000);

    model.set_named_bit("flags", "hasMesh", false).unwrap();
    assert_eq!(model.int("flags").unwrap(), 0x20000);

    let pairs = model.bit_name_mask_pairs("flags").unwrap();
    assert!(pairs.contains(&("hasMesh".to_owned(), 0x100)));
    assert!(pairs.contains(&("hasVertices".to_owned(), 0x20000)));

    assert!(matches!(model.named_bit("flags", "nope"), Err(M3LibError::InstanceBitNotFound(_, _))));
    assert!(matches!(model.named_bit("modelType", "hasMesh"), Err(M3LibError::InstanceNotAFlagField(_))));
    assert!(matches!(model.int("nope"), Err(M3LibError::InstanceFieldNotFound(_, _))));
}

#[test]
fn test_validation_catches_shape_errors() {
    let schema = test_schema();
    let description = schema.description("MODL", 23).unwrap();

    // Integer out of its declared width.
    let mut model = Instance::new(&description);
    model.set_int("modelType", u32::MAX as i64 + 1).unwrap();
    assert!(matches!(validator::validate(&model, "model"), Err(M3LibError::ValidationIntegerOutOfRange(path, _, _, _)) if path == "model.modelType"));

    // A refTo-less reference must stay empty.
    let mut model = Instance::new(&description);
    let stray = Instance::new(&schema.description("VEC3", 0).unwrap());
    model.set_pointer("extra", Payload::Instances(vec![stray]).shared()).unwrap();
    assert!(matches!(validator::validate(&model, "model"), Err(M3LibError::ValidationNotAnEmptyList(path)) if path == "model.extra"));

    // A structure list referencing the wrong structure type.
    let mut model = Instance::new(&description);
    let stray = Instance::new(&schema.description("VEC3", 0).unwrap());
    model.set_pointer("bones", Payload::Instances(vec![stray]).shared()).unwrap();
    assert!(matches!(validator::validate(&model, "model"), Err(M3LibError::ValidationWrongStructureList(_, expected, found)) if expected == "BONE" && found == "VEC3"));

    // Reference element ranges are checked too.
    let mut model = Instance::new(&description);
    model.set_pointer("indices", Payload::Ints(vec![1, 70000]).shared()).unwrap();
    assert!(matches!(validator::validate(&model, "model"), Err(M3LibError::ValidationIntegerOutOfRange(path, 70000, _, _)) if path == "model.indices[1]"));

    // Unresolved references are not valid content.
    let mut model = Instance::new(&description);
    model.set_value("floats", Value::Ref(Reference::default())).unwrap();
    assert!(matches!(validator::validate(&model, "model"), Err(M3LibError::ValidationUnresolvedReference(path)) if path == "model.floats"));
}
