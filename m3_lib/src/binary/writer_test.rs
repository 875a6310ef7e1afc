//---------------------------------------------------------------------------//
// Copyright (c) 2017-2024 Ismael Gutiérrez González. All rights reserved.
//
// This file is part of the M3 Model Codec (m3_lib) project,
// which can be found here: https://github.com/Frodo45127/m3_lib.
//
// This file is licensed under the MIT license, which can be found here:
// https://github.com/Frodo45127/m3_lib/blob/master/LICENSE.
//---------------------------------------------------------------------------//

//! Module containing tests for the [`WriteBytes`] trait.

use super::WriteBytes;

#[test]
fn test_write_integers() {
    let mut data = vec![];
    data.write_i16(-2).unwrap();
    data.write_u32(10).unwrap();
    assert_eq!(data, vec![0xFE, 0xFF, 0x0A, 0x00, 0x00, 0x00]);
}

#[test]
fn test_write_f32() {
    let mut data = vec![];
    data.write_f32(1.0).unwrap();
    assert_eq!(data, vec![0x00, 0x00, 0x80, 0x3F]);
}

#[test]
fn test_write_string_ascii() {
    let mut data = vec![];
    data.write_string_ascii("MD34").unwrap();
    assert_eq!(data, vec![0x4D, 0x44, 0x33, 0x34]);
}
