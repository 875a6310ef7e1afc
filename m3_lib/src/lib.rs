//---------------------------------------------------------------------------//
// Copyright (c) 2017-2024 Ismael Gutiérrez González. All rights reserved.
//
// This file is part of the M3 Model Codec (m3_lib) project,
// which can be found here: https://github.com/Frodo45127/m3_lib.
//
// This file is licensed under the MIT license, which can be found here:
// https://github.com/Frodo45127/m3_lib/blob/master/LICENSE.
//---------------------------------------------------------------------------//

//! This is the M3 Codec Lib, a lib to read and write M3 model files, the container
//! format StarCraft II uses for its 3D models.
//!
//! M3 files are schema-driven: the record types, their versions and their fields all
//! come from an XML document of structure definitions, loaded once into a
//! [`Schema`]. With a schema at hand, a whole file round-trips through
//! [`load_model`]/[`save_model`], giving you the root model record as a fully
//! resolved object graph: references between sections become shared handles to the
//! referenced content, and get flattened back into a section table on save.
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use m3_lib::{load_model, save_model, Schema};
//!
//! # fn main() -> m3_lib::Result<()> {
//! let schema = Schema::load(Path::new("structures.xml"))?;
//! let mut model = load_model(&schema, Path::new("marine.m3"), true)?;
//!
//! model.set_named_bit("flags", "hasMesh", true)?;
//!
//! // Saving consumes the model: its graph gets rewritten during the flattening.
//! save_model(&schema, model, Path::new("marine_patched.m3"))?;
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub mod binary;
pub mod error;
pub mod model;
pub mod schema;
pub mod sections;
pub mod validator;

pub use crate::error::{M3LibError, Result};
pub use crate::model::{Instance, Payload, Pointer, Reference, SharedPayload, Value};
pub use crate::schema::Schema;
pub use crate::validator::validate;

/// This function loads a whole M3 file into its root model record.
///
/// With `check_expected_value` enabled, any field the definitions pin to an expected
/// value gets checked while decoding, and a mismatch fails the load.
pub fn load_model(schema: &Schema, path: &Path, check_expected_value: bool) -> Result<Instance> {
    let mut file = BufReader::new(File::open(path)?);
    sections::read_model(&mut file, schema, check_expected_value)
}

/// This function validates a model and writes it as an M3 file.
///
/// The model is consumed: flattening the graph into sections rewrites its references
/// in place, so the value is taken over instead of left behind in a broken state.
pub fn save_model(schema: &Schema, model: Instance, path: &Path) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    sections::write_model(model, schema, &mut file)?;
    file.flush().map_err(From::from)
}
