//---------------------------------------------------------------------------//
// Copyright (c) 2017-2024 Ismael Gutiérrez González. All rights reserved.
//
// This file is part of the M3 Model Codec (m3_lib) project,
// which can be found here: https://github.com/Frodo45127/m3_lib.
//
// This file is licensed under the MIT license, which can be found here:
// https://github.com/Frodo45127/m3_lib/blob/master/LICENSE.
//---------------------------------------------------------------------------//

//! Module containing tests for the [`ReadBytes`] trait.

use float_eq::assert_float_eq;

use std::io::Cursor;

use super::ReadBytes;

#[test]
fn test_read_slice() {
    let mut cursor = Cursor::new(vec![1u8, 2, 3, 4]);
    assert_eq!(cursor.read_slice(2, true).unwrap(), vec![1, 2]);
    assert_eq!(cursor.read_slice(4, false).unwrap(), vec![1, 2, 3, 4]);
    assert!(cursor.read_slice(1, false).is_err());
}

#[test]
fn test_read_integers() {
    let mut cursor = Cursor::new(vec![0xFE, 0xFF, 0x0A, 0x00, 0x00, 0x00]);
    assert_eq!(cursor.read_i16().unwrap(), -2);
    assert_eq!(cursor.read_u32().unwrap(), 10);
    assert!(cursor.read_u8().is_err());
}

#[test]
fn test_read_f32_normal_from_u8() {
    let mut cursor = Cursor::new(vec![0x00, 0xFF, 0x80]);
    assert_float_eq!(cursor.read_f32_normal_from_u8().unwrap(), -1.0, abs <= 0.0);
    assert_float_eq!(cursor.read_f32_normal_from_u8().unwrap(), 1.0, abs <= 0.0);
    assert_float_eq!(cursor.read_f32_normal_from_u8().unwrap(), 0.00392, abs <= 0.0001);
}

#[test]
fn test_read_string_ascii() {
    let mut cursor = Cursor::new(b"Wahaha\xFF".to_vec());
    assert_eq!(cursor.read_string_ascii(6).unwrap(), "Wahaha");
    assert!(cursor.read_string_ascii(1).is_err());
}
