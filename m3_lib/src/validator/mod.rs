//---------------------------------------------------------------------------//
// Copyright (c) 2017-2024 Ismael Gutiérrez González. All rights reserved.
//
// This file is part of the M3 Model Codec (m3_lib) project,
// which can be found here: https://github.com/Frodo45127/m3_lib.
//
// This file is licensed under the MIT license, which can be found here:
// https://github.com/Frodo45127/m3_lib/blob/master/LICENSE.
//---------------------------------------------------------------------------//

//! This module contains the structural validator for in-memory instances.
//!
//! Validation runs over a fully resolved graph: every field of every instance is
//! checked against its descriptor (integer ranges, float/tag/byte-blob shapes,
//! reference content kinds, element ranges), recursing through embedded structures
//! and referenced instance lists. The save path runs it before touching the output;
//! it's also exposed standalone for callers that build or patch models by hand.

use crate::error::Result;
use crate::model::Instance;

/// This function checks every field of the provided instance, recursively.
///
/// `path_label` names the instance in error messages, like `"model"`. Field paths are
/// appended to it, producing errors about `model.sequences[2].name` and the likes.
pub fn validate(instance: &Instance, path_label: &str) -> Result<()> {
    for (field, value) in instance.description().fields().iter().zip(instance.values().iter()) {
        let field_path = format!("{path_label}.{}", field.name());
        field.validate_value(value, &field_path)?;
    }
    Ok(())
}
