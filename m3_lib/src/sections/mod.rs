//---------------------------------------------------------------------------//
// Copyright (c) 2017-2024 Ismael Gutiérrez González. All rights reserved.
//
// This file is part of the M3 Model Codec (m3_lib) project,
// which can be found here: https://github.com/Frodo45127/m3_lib.
//
// This file is licensed under the MIT license, which can be found here:
// https://github.com/Frodo45127/m3_lib/blob/master/LICENSE.
//---------------------------------------------------------------------------//

//! This module contains the file-level codec: sections, the index table, and the
//! bidirectional reference resolver.
//!
//! # M3 file structure
//!
//! | Bytes | Type | Data |
//! | ----- | ---- | ---- |
//! | 24 (per definitions) | `MD34` V11 | Header. Also section 0 of the file. |
//! | Variable | raw bytes | Sections 1.., back to back in ascending offset order, each padded to 16 bytes with `0xAA`. |
//! | 16 * indexSize | `MD34IndexEntry` V0 | Index table, at `header.indexOffset`. |
//!
//! Each [`IndexEntry`] locates one section by `(tag, version, offset, repetitions)`.
//! Sections reference each other through reference records (`entries`, `index`,
//! `flags`), with `index` pointing into the index table. On load, every reference is
//! replaced by the content of the section it points to; on save, the object graph is
//! walked depth-first, every referenced list gets a section (one per *identity*, so
//! aliased lists share), and the references are flattened back to records.

use getset::Getters;
use itertools::Itertools;
use log::{error, warn};
use memchr::memmem;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::io::SeekFrom;
use std::rc::Rc;
use std::sync::Arc;

use crate::binary::{ReadBytes, WriteBytes};
use crate::error::{M3LibError, Result};
use crate::model::{Instance, Payload, Reference, SharedPayload};
use crate::schema::{Schema, StructureDescription};
use crate::validator;


/// Sections are laid out in blocks of this size.
const SECTION_BLOCK_SIZE: usize = 16;

/// Byte used to fill the space between the content of a section and its next block boundary.
const SECTION_PADDING_BYTE: u8 = 0xAA;

/// Tag the header of a supported M3 file carries.
const HEADER_TAG: &str = "MD34";

/// Structure and version of the header.
const HEADER_STRUCTURE_NAME: &str = "MD34";
const HEADER_VERSION: u32 = 11;

/// Structure of the index table entries.
const INDEX_ENTRY_STRUCTURE_NAME: &str = "MD34IndexEntry";

/// Structure of the full-size reference record, used for the orphan diagnostics.
const REFERENCE_STRUCTURE_NAME: &str = "Reference";

//---------------------------------------------------------------------------//
//                              Enum & Structs
//---------------------------------------------------------------------------//

/// This struct is an entry of the index table, locating one section of the file.
#[derive(Clone, Debug, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct IndexEntry {

    /// Tag (structure name) of the section's content.
    tag: String,

    /// Offset of the section in the file.
    offset: u32,

    /// Amount of elements the section holds.
    repetitions: u32,

    /// Structure version of the section's content.
    version: u32,
}

/// This struct holds one section of an M3 file: its index entry, its bytes as they
/// are on disk, and its decoded content.
#[derive(Debug, Getters)]
#[getset(get = "pub")]
pub struct Section {

    /// The index table entry locating this section.
    index_entry: IndexEntry,

    /// Description of the section's content.
    description: Arc<StructureDescription>,

    /// The section's bytes, padding included. Empty on the save path until
    /// [`Section::determine_raw_bytes`] runs.
    raw_bytes: Vec<u8>,

    /// The section's decoded content.
    content: SharedPayload,

    /// How many references point to this section. After resolution, every section
    /// except the header must have at least one.
    #[getset(skip)]
    times_referenced: Cell<u32>,
}

/// This struct walks an object graph on save, handing out index references and
/// building the section list they point into.
///
/// Sharing is decided by identity: asking twice for a reference to the *same* content
/// handle returns the same section index, and the section is only stored once.
#[derive(Default)]
pub struct IndexMaker {

    /// Memoized references, keyed by content handle identity.
    references: HashMap<*const RefCell<Payload>, Reference>,

    /// Sections allocated so far, in file order.
    sections: Vec<Section>,

    /// File offset the next section will start at.
    offset: u32,

    /// Index the next section will get in the index table.
    next_free_index: u32,
}

//---------------------------------------------------------------------------//
//                      Implementation of IndexEntry
//---------------------------------------------------------------------------//

impl IndexEntry {

    /// This function builds an index entry from its parts.
    pub fn new(tag: &str, offset: u32, repetitions: u32, version: u32) -> Self {
        Self {
            tag: tag.to_owned(),
            offset,
            repetitions,
            version,
        }
    }

    /// This function reads an index entry from the current position of `data`, using
    /// the provided `MD34IndexEntry` description.
    fn read<R: ReadBytes>(description: &Arc<StructureDescription>, data: &mut R, check_expected_value: bool) -> Result<Self> {
        let instance = Instance::from_bytes(description, data, check_expected_value)?;
        Ok(Self {
            tag: instance.tag("tag")?.to_owned(),
            offset: instance.int("offset")? as u32,
            repetitions: instance.int("repetitions")? as u32,
            version: instance.int("version")? as u32,
        })
    }

    /// This function writes the index entry at the current position of `buffer`, using
    /// the provided `MD34IndexEntry` description.
    fn write<W: WriteBytes>(&self, description: &Arc<StructureDescription>, buffer: &mut W) -> Result<()> {
        let mut instance = Instance::new(description);
        instance.set_tag("tag", &self.tag)?;
        instance.set_int("offset", self.offset as i64)?;
        instance.set_int("repetitions", self.repetitions as i64)?;
        instance.set_int("version", self.version as i64)?;
        instance.write(buffer)
    }
}

//---------------------------------------------------------------------------//
//                      Implementation of Section
//---------------------------------------------------------------------------//

impl Section {

    /// This function builds a section read from disk.
    fn from_disk(index_entry: IndexEntry, description: Arc<StructureDescription>, raw_bytes: Vec<u8>, content: SharedPayload) -> Self {
        Self {
            index_entry,
            description,
            raw_bytes,
            content,
            times_referenced: Cell::new(0),
        }
    }

    /// This function builds a section about to be written to disk. Its raw bytes stay
    /// empty until [`Self::determine_raw_bytes`] runs.
    fn from_content(index_entry: IndexEntry, description: Arc<StructureDescription>, content: SharedPayload) -> Self {
        Self {
            index_entry,
            description,
            raw_bytes: vec![],
            content,
            times_referenced: Cell::new(0),
        }
    }

    /// This function returns how many references point to this section.
    pub fn times_referenced(&self) -> u32 {
        self.times_referenced.get()
    }

    /// This function bumps the reference counter of this section.
    pub fn mark_referenced(&self) {
        self.times_referenced.set(self.times_referenced.get() + 1);
    }

    /// This function encodes the section's content into its raw bytes, checking the
    /// size against the one its structure description predicts, and padding the result
    /// to the section block size.
    pub fn determine_raw_bytes(&mut self) -> Result<()> {
        let payload = self.content.borrow();

        let mut raw_bytes = vec![];
        self.description.write_instances(&payload, &mut raw_bytes)?;

        let required = self.description.bytes_required(&payload)? as usize;
        if raw_bytes.len() != required {
            return Err(M3LibError::EncodingSectionSizeMismatch(self.description.name().to_owned(), required, raw_bytes.len()));
        }

        raw_bytes.resize(padded_size(raw_bytes.len()), SECTION_PADDING_BYTE);

        drop(payload);
        self.raw_bytes = raw_bytes;
        Ok(())
    }
}

//---------------------------------------------------------------------------//
//                      Implementation of IndexMaker
//---------------------------------------------------------------------------//

impl IndexMaker {

    /// This function creates an index maker with no sections yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// This function returns if the provided content already has a section.
    pub fn contains(&self, target: &SharedPayload) -> bool {
        self.references.contains_key(&Rc::as_ptr(target))
    }

    /// This function returns the file offset the next section would start at, which is
    /// the index table offset once the whole graph has been walked.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// This function returns how many sections have been allocated so far.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// This function consumes the maker, returning the allocated sections in file order.
    pub fn into_sections(self) -> Vec<Section> {
        self.sections
    }

    /// This function returns an index reference to the provided content, allocating a
    /// section for it on first sight.
    ///
    /// `element_description` is the structure the content serializes with, or `None`
    /// when the content is empty and untyped. Empty content gets a reference with zero
    /// entries pointing at the next free index, and no section.
    pub fn reference_to(&mut self, target: &SharedPayload, flags: u32, element_description: Option<&Arc<StructureDescription>>) -> Result<Reference> {
        let key = Rc::as_ptr(target);
        if let Some(memoized) = self.references.get(&key) {
            return Ok(Reference { entries: memoized.entries, index: memoized.index, flags });
        }

        if let Some(description) = element_description {
            let (repetitions, required_bytes) = {
                let payload = target.try_borrow().map_err(|_| M3LibError::EncodingCyclicReference(description.name().to_owned()))?;
                (description.count_instances(&payload)?, description.bytes_required(&payload)?)
            };

            if repetitions > 0 {
                let index = self.next_free_index;
                let entry = IndexEntry::new(description.name(), self.offset, repetitions, *description.version());
                self.sections.push(Section::from_content(entry, description.clone(), target.clone()));
                self.references.insert(key, Reference { entries: repetitions, index, flags: 0 });
                self.offset += padded_size(required_bytes as usize) as u32;
                self.next_free_index += 1;
                return Ok(Reference { entries: repetitions, index, flags });
            }
        }

        Ok(Reference { entries: 0, index: self.next_free_index, flags })
    }
}

//---------------------------------------------------------------------------//
//                          Load path
//---------------------------------------------------------------------------//

/// This function reads every section of an M3 file, with its content decoded but its
/// references still unresolved.
///
/// It fails if any section's `(tag, version)` pair is missing from the structure
/// definitions, after logging a diagnostic with a guess of the missing entry size.
pub fn read_sections<R: ReadBytes>(data: &mut R, schema: &Schema, check_expected_value: bool) -> Result<Vec<Section>> {
    let header_description = schema.description(HEADER_STRUCTURE_NAME, HEADER_VERSION)?;

    data.seek(SeekFrom::Start(0))?;
    let header = Instance::from_bytes(&header_description, data, check_expected_value)?;
    let tag = header.tag("tag")?;
    if tag != HEADER_TAG {
        return Err(M3LibError::DecodingNotAnM3File(tag.to_owned()));
    }

    let index_offset = header.int("indexOffset")? as u32;
    let index_size = header.int("indexSize")? as usize;

    let entry_description = schema.description(INDEX_ENTRY_STRUCTURE_NAME, 0)?;
    data.seek(SeekFrom::Start(index_offset as u64))?;
    let mut entries = Vec::with_capacity(index_size);
    for _ in 0..index_size {
        entries.push(IndexEntry::read(&entry_description, data, check_expected_value)?);
    }

    // A section ends where the next one (or the index table) starts.
    let mut offsets = entries.iter().map(|entry| *entry.offset()).collect::<Vec<u32>>();
    offsets.push(index_offset);
    offsets.sort_unstable();
    offsets.dedup();

    let mut offset_to_size: HashMap<u32, u32> = HashMap::new();
    for window in offsets.windows(2) {
        offset_to_size.insert(window[0], window[1] - window[0]);
    }

    let mut sections = Vec::with_capacity(entries.len());
    let mut unknown_sections = BTreeSet::new();
    for entry in entries {
        let length = offset_to_size.get(entry.offset()).copied().unwrap_or(0) as usize;
        data.seek(SeekFrom::Start(*entry.offset() as u64))?;
        let raw_bytes = data.read_slice(length, false)?;

        let description = schema.structure(entry.tag()).and_then(|history| history.version(*entry.version())).cloned();
        match description {
            Some(description) => {
                let content = StructureDescription::create_instances(&description, &raw_bytes, *entry.repetitions(), check_expected_value)?;
                sections.push(Section::from_disk(entry, description, raw_bytes, content.shared()));
            },
            None => {

                // Estimate the amount of padding from the trailing fill bytes, then
                // guess the entry size to help whoever has to extend the definitions.
                let padding = raw_bytes.iter().rev().take(SECTION_BLOCK_SIZE - 1).take_while(|byte| **byte == SECTION_PADDING_BYTE).count();
                let guessed_bytes_per_entry = if *entry.repetitions() > 0 {
                    (length - padding) as f64 / *entry.repetitions() as f64
                } else {
                    0.0
                };

                error!("Unknown section at offset {} with tag={} version={} repetitions={} sectionLengthInBytes={} guessedUnusedSectionBytes={} guessedBytesPerEntry={}",
                    entry.offset(), entry.tag(), entry.version(), entry.repetitions(), length, padding, guessed_bytes_per_entry);

                unknown_sections.insert(format!("{}V{}", entry.tag(), entry.version()));
            },
        }
    }

    if !unknown_sections.is_empty() {
        return Err(M3LibError::DecodingUnknownSections(unknown_sections.len(), unknown_sections.iter().join(", ")));
    }

    Ok(sections)
}

/// This function resolves every reference of every section, replacing the on-disk
/// records with the content of the sections they point to.
pub fn resolve_references(sections: &[Section]) -> Result<()> {
    for section in sections {
        if !*section.description().is_primitive() {
            let content = section.content().clone();
            let mut payload = content.borrow_mut();
            if let Payload::Instances(instances) = &mut *payload {
                for instance in instances {
                    instance.resolve_references(sections)?;
                }
            }
        }
    }
    Ok(())
}

/// This function checks that, after resolution, every section except the header got
/// referenced at least once.
///
/// Before failing, it scans the whole file for the bytes a reference to each orphaned
/// section would have (first verbatim, then with the flags word stripped), and logs
/// every hit together with the field offsets of the section it was found in.
pub fn check_all_sections_referenced(sections: &[Section], schema: &Schema) -> Result<()> {
    let reference_description = schema.description(REFERENCE_STRUCTURE_NAME, 0)?;
    let mut unreferenced_sections = 0;

    for (index, section) in sections.iter().enumerate() {
        if index == 0 || section.times_referenced() > 0 {
            continue;
        }
        unreferenced_sections += 1;

        let entry = section.index_entry();
        warn!("{}V{} ({} repetitions) got {} times referenced", entry.tag(), entry.version(), entry.repetitions(), section.times_referenced());

        let mut reference = Instance::new(&reference_description);
        reference.set_int("entries", *entry.repetitions() as i64)?;
        reference.set_int("index", index as i64)?;
        if reference_description.has_field("flags") {
            reference.set_int("flags", 0)?;
        }

        let mut bytes_to_search = vec![];
        reference.write(&mut bytes_to_search)?;

        let mut possible_references = 0;
        for section_to_check in sections {
            if let Some(position) = memmem::find(section_to_check.raw_bytes(), &bytes_to_search) {
                possible_references += 1;
                error!("  -> Found a reference at offset {} in a section of type {}V{}",
                    position, section_to_check.index_entry().tag(), section_to_check.index_entry().version());
                section_to_check.description().dump_offsets();
            }
        }

        // No verbatim hit. Strip the flags word and retry, to catch references with
        // non-zero flags.
        if possible_references == 0 && bytes_to_search.len() > 4 {
            let bytes_to_search = &bytes_to_search[..bytes_to_search.len() - 4];
            for section_to_check in sections {
                if let Some(position) = memmem::find(section_to_check.raw_bytes(), bytes_to_search) {
                    let flags = section_to_check.raw_bytes().get(position + 8..position + 12).unwrap_or_default();
                    let flags_as_hex = flags.iter().map(|byte| format!("{byte:02X}")).join("");
                    error!("  -> Found maybe a reference at offset {} in a section of type {}V{} with flag {}",
                        position, section_to_check.index_entry().tag(), section_to_check.index_entry().version(), flags_as_hex);
                    section_to_check.description().dump_offsets();
                }
            }
        }
    }

    if unreferenced_sections > 0 {
        return Err(M3LibError::DecodingUnreferencedSections(unreferenced_sections));
    }
    Ok(())
}

/// This function reads a whole model from anything readable: sections, reference
/// resolution, orphan check, and validation of the root instance.
pub fn read_model<R: ReadBytes>(data: &mut R, schema: &Schema, check_expected_value: bool) -> Result<Instance> {
    let sections = read_sections(data, schema, check_expected_value)?;
    resolve_references(&sections)?;
    check_all_sections_referenced(&sections, schema)?;

    let header_section = sections.first().ok_or(M3LibError::DecodingModelMissing)?;
    let header_payload = header_section.content().borrow();
    let header = match &*header_payload {
        Payload::Instances(instances) => instances.first().ok_or(M3LibError::DecodingModelMissing)?,
        _ => return Err(M3LibError::DecodingModelMissing),
    };

    let model_pointer = header.pointer("model")?;
    let model_payload = model_pointer.target().borrow();
    let model = match &*model_payload {
        Payload::Instances(instances) => instances.first().cloned().ok_or(M3LibError::DecodingModelMissing)?,
        _ => return Err(M3LibError::DecodingModelMissing),
    };

    validator::validate(&model, "model")?;
    Ok(model)
}

//---------------------------------------------------------------------------//
//                          Save path
//---------------------------------------------------------------------------//

/// This function flattens a model into the section list of the file it will become.
///
/// The model graph is consumed: its references get rewritten into on-disk records
/// while the graph is walked.
pub fn model_to_sections(model: Instance, schema: &Schema) -> Result<Vec<Section>> {
    let header_description = schema.description(HEADER_STRUCTURE_NAME, HEADER_VERSION)?;

    let mut header = Instance::new(&header_description);
    header.set_tag("tag", HEADER_TAG)?;
    header.set_pointer("model", Payload::Instances(vec![model]).shared())?;

    // The header is section 0 and references everything else.
    let header_payload = Payload::Instances(vec![header]).shared();
    let mut index_maker = IndexMaker::new();
    index_maker.reference_to(&header_payload, 0, Some(&header_description))?;

    {
        let mut payload = header_payload.borrow_mut();
        if let Payload::Instances(instances) = &mut *payload {
            for instance in instances.iter_mut() {
                instance.introduce_index_references(&mut index_maker)?;
            }
        }
    }

    let index_offset = index_maker.offset();
    let index_size = index_maker.section_count();
    {
        let mut payload = header_payload.borrow_mut();
        if let Payload::Instances(instances) = &mut *payload {
            instances[0].set_int("indexOffset", index_offset as i64)?;
            instances[0].set_int("indexSize", index_size as i64)?;
        }
    }

    let mut sections = index_maker.into_sections();
    for section in &mut sections {
        section.determine_raw_bytes()?;
    }
    Ok(sections)
}

/// This function writes the provided sections and their index table to `buffer`,
/// verifying that every section lands at the offset its index entry claims.
pub fn write_sections<W: WriteBytes>(sections: &[Section], schema: &Schema, buffer: &mut W) -> Result<()> {
    let entry_description = schema.description(INDEX_ENTRY_STRUCTURE_NAME, 0)?;

    let mut position: u64 = 0;
    for section in sections {
        let entry = section.index_entry();
        if *entry.offset() as u64 != position {
            return Err(M3LibError::EncodingSectionOffsetMismatch(entry.tag().to_owned(), *entry.offset(), position));
        }
        buffer.write_all(section.raw_bytes())?;
        position += section.raw_bytes().len() as u64;
    }

    let index_offset = {
        let header_section = sections.first().ok_or(M3LibError::DecodingModelMissing)?;
        let payload = header_section.content().borrow();
        match &*payload {
            Payload::Instances(instances) => instances.first().ok_or(M3LibError::DecodingModelMissing)?.int("indexOffset")?,
            _ => return Err(M3LibError::DecodingModelMissing),
        }
    };
    if position != index_offset as u64 {
        return Err(M3LibError::EncodingIndexOffsetMismatch(index_offset as u32, position));
    }

    for section in sections {
        section.index_entry().write(&entry_description, buffer)?;
    }
    Ok(())
}

/// This function validates a model and writes it to anything writable.
///
/// The model is consumed: its in-memory graph gets rewritten during the flattening
/// and must not be reused, which taking it by value conveniently prevents.
pub fn write_model<W: WriteBytes>(model: Instance, schema: &Schema, buffer: &mut W) -> Result<()> {
    validator::validate(&model, "model")?;
    let sections = model_to_sections(model, schema)?;
    write_sections(&sections, schema, buffer)
}

/// This function rounds a content size up to the next section block boundary.
fn padded_size(size: usize) -> usize {
    size.div_ceil(SECTION_BLOCK_SIZE) * SECTION_BLOCK_SIZE
}
