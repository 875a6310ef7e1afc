//---------------------------------------------------------------------------//
// Copyright (c) 2017-2024 Ismael Gutiérrez González. All rights reserved.
//
// This file is part of the M3 Model Codec (m3_lib) project,
// which can be found here: https://github.com/Frodo45127/m3_lib.
//
// This file is licensed under the MIT license, which can be found here:
// https://github.com/Frodo45127/m3_lib/blob/master/LICENSE.
//---------------------------------------------------------------------------//

//! Module with the [`WriteBytes`] trait, to write bytes from known types to a [`Writer`].
//!
//! [`Writer`]: std::io::Write

use byteorder::{LittleEndian, WriteBytesExt};

use std::io::Write;

use crate::error::Result;

//---------------------------------------------------------------------------//
//                            Trait Definition
//---------------------------------------------------------------------------//

/// This trait allow us to easily write all kind of data types to something that implements [`Write`].
pub trait WriteBytes: Write {

    /// This function tries to write a byte value to `self`.
    ///
    /// It may fail if `self` cannot be written to.
    ///
    /// ```rust
    /// use m3_lib::binary::WriteBytes;
    ///
    /// let mut data = vec![];
    /// assert!(data.write_u8(10).is_ok());
    /// assert_eq!(data, vec![10]);
    /// ```
    fn write_u8(&mut self, value: u8) -> Result<()> {
        WriteBytesExt::write_u8(self, value).map_err(From::from)
    }

    /// This function tries to write an u16 value to `self`.
    ///
    /// It may fail if `self` cannot be written to.
    ///
    /// ```rust
    /// use m3_lib::binary::WriteBytes;
    ///
    /// let mut data = vec![];
    /// assert!(data.write_u16(258).is_ok());
    /// assert_eq!(data, vec![2, 1]);
    /// ```
    fn write_u16(&mut self, integer: u16) -> Result<()> {
        WriteBytesExt::write_u16::<LittleEndian>(self, integer).map_err(From::from)
    }

    /// This function tries to write an u32 value to `self`.
    ///
    /// It may fail if `self` cannot be written to.
    ///
    /// ```rust
    /// use m3_lib::binary::WriteBytes;
    ///
    /// let mut data = vec![];
    /// assert!(data.write_u32(258).is_ok());
    /// assert_eq!(data, vec![2, 1, 0, 0]);
    /// ```
    fn write_u32(&mut self, integer: u32) -> Result<()> {
        WriteBytesExt::write_u32::<LittleEndian>(self, integer).map_err(From::from)
    }

    /// This function tries to write an i8 value to `self`.
    ///
    /// It may fail if `self` cannot be written to.
    ///
    /// ```rust
    /// use m3_lib::binary::WriteBytes;
    ///
    /// let mut data = vec![];
    /// assert!(data.write_i8(-2).is_ok());
    /// assert_eq!(data, vec![254]);
    /// ```
    fn write_i8(&mut self, integer: i8) -> Result<()> {
        WriteBytesExt::write_i8(self, integer).map_err(From::from)
    }

    /// This function tries to write an i16 value to `self`.
    ///
    /// It may fail if `self` cannot be written to.
    ///
    /// ```rust
    /// use m3_lib::binary::WriteBytes;
    ///
    /// let mut data = vec![];
    /// assert!(data.write_i16(-258).is_ok());
    /// assert_eq!(data, vec![254, 254]);
    /// ```
    fn write_i16(&mut self, integer: i16) -> Result<()> {
        WriteBytesExt::write_i16::<LittleEndian>(self, integer).map_err(From::from)
    }

    /// This function tries to write an i32 value to `self`.
    ///
    /// It may fail if `self` cannot be written to.
    ///
    /// ```rust
    /// use m3_lib::binary::WriteBytes;
    ///
    /// let mut data = vec![];
    /// assert!(data.write_i32(-258).is_ok());
    /// assert_eq!(data, vec![254, 254, 255, 255]);
    /// ```
    fn write_i32(&mut self, integer: i32) -> Result<()> {
        WriteBytesExt::write_i32::<LittleEndian>(self, integer).map_err(From::from)
    }

    /// This function tries to write an f32 value to `self`.
    ///
    /// It may fail if `self` cannot be written to.
    ///
    /// ```rust
    /// use m3_lib::binary::WriteBytes;
    ///
    /// let mut data = vec![];
    /// assert!(data.write_f32(10.0).is_ok());
    /// assert_eq!(data, vec![0, 0, 32, 65]);
    /// ```
    fn write_f32(&mut self, value: f32) -> Result<()> {
        WriteBytesExt::write_f32::<LittleEndian>(self, value).map_err(From::from)
    }

    /// This function tries to write an ASCII String to `self`, with no length prefix nor terminator.
    ///
    /// It may fail if `self` cannot be written to.
    ///
    /// ```rust
    /// use m3_lib::binary::WriteBytes;
    ///
    /// let mut data = vec![];
    /// assert!(data.write_string_ascii("MD34").is_ok());
    /// assert_eq!(data, vec![77, 68, 51, 52]);
    /// ```
    fn write_string_ascii(&mut self, string: &str) -> Result<()> {
        self.write_all(string.as_bytes()).map_err(From::from)
    }
}

// Automatic implementation for everything that implements `Write`.
impl<W: Write> WriteBytes for W {}
