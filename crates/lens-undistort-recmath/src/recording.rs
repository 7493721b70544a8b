//! Minimal recording model: named n-d arrays with element-type tags,
//! metadata and a one-way lifecycle.

use crate::{Metadata, RecmathError};
use lens_undistort_core::SampleKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Element types a recording array may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ElementType {
    /// The pixel kind this element type maps to, if images of it can be
    /// undistorted.
    pub fn sample_kind(self) -> Option<SampleKind> {
        match self {
            ElementType::U8 => Some(SampleKind::U8),
            ElementType::U16 => Some(SampleKind::U16),
            ElementType::F32 => Some(SampleKind::F32),
            _ => None,
        }
    }
}

impl From<SampleKind> for ElementType {
    fn from(kind: SampleKind) -> Self {
        match kind {
            SampleKind::U8 => ElementType::U8,
            SampleKind::U16 => ElementType::U16,
            SampleKind::F32 => ElementType::F32,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementType::U8 => "uint8",
            ElementType::I8 => "int8",
            ElementType::U16 => "uint16",
            ElementType::I16 => "int16",
            ElementType::U32 => "uint32",
            ElementType::I32 => "int32",
            ElementType::U64 => "uint64",
            ElementType::I64 => "int64",
            ElementType::F32 => "float32",
            ElementType::F64 => "float64",
        };
        f.write_str(s)
    }
}

/// Flat element storage tagged with its element type.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ArrayData {
    pub fn zeros(element_type: ElementType, len: usize) -> Self {
        match element_type {
            ElementType::U8 => ArrayData::U8(vec![0; len]),
            ElementType::I8 => ArrayData::I8(vec![0; len]),
            ElementType::U16 => ArrayData::U16(vec![0; len]),
            ElementType::I16 => ArrayData::I16(vec![0; len]),
            ElementType::U32 => ArrayData::U32(vec![0; len]),
            ElementType::I32 => ArrayData::I32(vec![0; len]),
            ElementType::U64 => ArrayData::U64(vec![0; len]),
            ElementType::I64 => ArrayData::I64(vec![0; len]),
            ElementType::F32 => ArrayData::F32(vec![0.0; len]),
            ElementType::F64 => ArrayData::F64(vec![0.0; len]),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            ArrayData::U8(_) => ElementType::U8,
            ArrayData::I8(_) => ElementType::I8,
            ArrayData::U16(_) => ElementType::U16,
            ArrayData::I16(_) => ElementType::I16,
            ArrayData::U32(_) => ElementType::U32,
            ArrayData::I32(_) => ElementType::I32,
            ArrayData::U64(_) => ElementType::U64,
            ArrayData::I64(_) => ElementType::I64,
            ArrayData::F32(_) => ElementType::F32,
            ArrayData::F64(_) => ElementType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::U8(v) => v.len(),
            ArrayData::I8(v) => v.len(),
            ArrayData::U16(v) => v.len(),
            ArrayData::I16(v) => v.len(),
            ArrayData::U32(v) => v.len(),
            ArrayData::I32(v) => v.len(),
            ArrayData::U64(v) => v.len(),
            ArrayData::I64(v) => v.len(),
            ArrayData::F32(v) => v.len(),
            ArrayData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A dense n-d array, row-major: for 2-D dims `[rows, cols]` element
/// `(i, j)` lives at `i * cols + j`.
#[derive(Clone, Debug, PartialEq)]
pub struct NdArray {
    dims: Vec<usize>,
    data: ArrayData,
}

impl NdArray {
    pub fn new(dims: Vec<usize>, data: ArrayData) -> Result<Self, RecmathError> {
        let expected: usize = dims.iter().product();
        if expected != data.len() {
            return Err(RecmathError::ArrayLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    pub fn zeros(element_type: ElementType, dims: Vec<usize>) -> Self {
        let len = dims.iter().product();
        Self {
            dims,
            data: ArrayData::zeros(element_type, len),
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn element_count(&self) -> usize {
        self.data.len()
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Replace the contents; the new data must match the element type and
    /// element count of the allocation.
    pub fn fill_from(&mut self, data: ArrayData) -> Result<(), RecmathError> {
        if data.len() != self.data.len() || data.element_type() != self.data.element_type() {
            return Err(RecmathError::ArrayLength {
                expected: self.data.len(),
                got: data.len(),
            });
        }
        self.data = data;
        Ok(())
    }
}

/// Lifecycle of a recording. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordingState {
    /// Created; metadata and arrays may still change.
    Pending,
    /// Metadata is final; arrays may still be written.
    MetadataDone,
    /// Immutable and visible to consumers.
    Ready,
}

/// A named set of arrays plus metadata.
#[derive(Clone, Debug)]
pub struct Recording {
    path: String,
    arrays: Vec<NdArray>,
    names: HashMap<String, usize>,
    metadata: Metadata,
    state: RecordingState,
}

impl Recording {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            arrays: Vec::new(),
            names: HashMap::new(),
            metadata: Metadata::new(),
            state: RecordingState::Pending,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == RecordingState::Ready
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn num_arrays(&self) -> usize {
        self.arrays.len()
    }

    /// Add (or replace) a named array; returns its index.
    pub fn define_array(
        &mut self,
        name: impl Into<String>,
        array: NdArray,
    ) -> Result<usize, RecmathError> {
        self.ensure_mutable()?;
        let name = name.into();
        if let Some(&idx) = self.names.get(&name) {
            self.arrays[idx] = array;
            return Ok(idx);
        }
        let idx = self.arrays.len();
        self.arrays.push(array);
        self.names.insert(name, idx);
        Ok(idx)
    }

    pub fn array(&self, index: usize) -> Option<&NdArray> {
        self.arrays.get(index)
    }

    pub fn array_named(&self, name: &str) -> Option<&NdArray> {
        self.names.get(name).and_then(|&idx| self.arrays.get(idx))
    }

    pub fn array_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn array_name(&self, index: usize) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, &idx)| idx == index)
            .map(|(name, _)| name.as_str())
    }

    pub fn array_mut(&mut self, index: usize) -> Result<&mut NdArray, RecmathError> {
        self.ensure_mutable()?;
        let path = self.path.clone();
        self.arrays
            .get_mut(index)
            .ok_or(RecmathError::UnknownArray { path, index })
    }

    pub fn set_metadata(&mut self, metadata: Metadata) -> Result<(), RecmathError> {
        if self.state != RecordingState::Pending {
            return Err(self.transition_error(RecordingState::Pending));
        }
        self.metadata = metadata;
        Ok(())
    }

    pub fn mark_metadata_done(&mut self) -> Result<(), RecmathError> {
        if self.state != RecordingState::Pending {
            return Err(self.transition_error(RecordingState::MetadataDone));
        }
        self.state = RecordingState::MetadataDone;
        Ok(())
    }

    pub fn mark_data_ready(&mut self) -> Result<(), RecmathError> {
        if self.state != RecordingState::MetadataDone {
            return Err(self.transition_error(RecordingState::Ready));
        }
        self.state = RecordingState::Ready;
        log::debug!("recording {} ready ({} arrays)", self.path, self.arrays.len());
        Ok(())
    }

    /// Finish a recording whose arrays are already in place: metadata done,
    /// then data ready.
    pub fn publish(mut self, metadata: Metadata) -> Result<Self, RecmathError> {
        self.set_metadata(metadata)?;
        self.mark_metadata_done()?;
        self.mark_data_ready()?;
        Ok(self)
    }

    fn ensure_mutable(&self) -> Result<(), RecmathError> {
        if self.state == RecordingState::Ready {
            return Err(RecmathError::AlreadyReady(self.path.clone()));
        }
        Ok(())
    }

    fn transition_error(&self, to: RecordingState) -> RecmathError {
        if self.state == RecordingState::Ready {
            return RecmathError::AlreadyReady(self.path.clone());
        }
        RecmathError::InvalidTransition {
            path: self.path.clone(),
            from: self.state,
            to,
        }
    }
}

/// Shared handle to a recording with scoped read/write access.
#[derive(Clone, Debug)]
pub struct SharedRecording {
    path: Arc<str>,
    inner: Arc<RwLock<Recording>>,
}

impl SharedRecording {
    pub fn new(recording: Recording) -> Self {
        Self {
            path: Arc::from(recording.path()),
            inner: Arc::new(RwLock::new(recording)),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, Recording>, RecmathError> {
        self.inner
            .read()
            .map_err(|_| RecmathError::LockPoisoned(self.path.to_string()))
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Recording>, RecmathError> {
        self.inner
            .write()
            .map_err(|_| RecmathError::LockPoisoned(self.path.to_string()))
    }

    /// Read access that also requires the recording to be ready.
    pub fn read_ready(&self) -> Result<RwLockReadGuard<'_, Recording>, RecmathError> {
        let guard = self.read()?;
        if !guard.is_ready() {
            return Err(RecmathError::NotReady(self.path.to_string()));
        }
        Ok(guard)
    }

    /// Clone out the current contents.
    pub fn snapshot(&self) -> Result<Recording, RecmathError> {
        Ok(self.read()?.clone())
    }
}

impl From<Recording> for SharedRecording {
    fn from(recording: Recording) -> Self {
        Self::new(recording)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_array() -> NdArray {
        NdArray::new(vec![2, 3], ArrayData::U16(vec![1, 2, 3, 4, 5, 6])).expect("array")
    }

    #[test]
    fn array_length_must_match_dims() {
        let err = NdArray::new(vec![2, 2], ArrayData::F32(vec![0.0; 3])).unwrap_err();
        assert_eq!(err, RecmathError::ArrayLength { expected: 4, got: 3 });
    }

    #[test]
    fn named_arrays_resolve_to_indices() {
        let mut rec = Recording::new("/cam");
        let a = rec.define_array("image", small_array()).expect("define");
        let b = rec
            .define_array("mask", NdArray::zeros(ElementType::U8, vec![2, 3]))
            .expect("define");
        assert_eq!((a, b), (0, 1));
        assert_eq!(rec.array_index("mask"), Some(1));
        assert_eq!(rec.array_name(0), Some("image"));
        assert_eq!(rec.array_named("image").map(|a| a.dims()), Some(&[2, 3][..]));
        assert!(rec.array_named("missing").is_none());

        // redefining keeps the slot
        let again = rec.define_array("image", small_array()).expect("redefine");
        assert_eq!(again, 0);
        assert_eq!(rec.num_arrays(), 2);
    }

    #[test]
    fn lifecycle_moves_forward_only() {
        let mut rec = Recording::new("/result");
        rec.define_array("image", small_array()).expect("define");
        assert!(matches!(
            rec.mark_data_ready(),
            Err(RecmathError::InvalidTransition { .. })
        ));
        rec.set_metadata(Metadata::new().with("k", 1i64)).expect("metadata");
        rec.mark_metadata_done().expect("metadata done");
        assert!(rec.set_metadata(Metadata::new()).is_err());
        rec.array_mut(0).expect("still writable");
        rec.mark_data_ready().expect("ready");

        assert!(rec.is_ready());
        assert_eq!(rec.array_mut(0).unwrap_err(), RecmathError::AlreadyReady("/result".into()));
        assert!(rec.define_array("late", small_array()).is_err());
        assert_eq!(
            rec.mark_metadata_done().unwrap_err(),
            RecmathError::AlreadyReady("/result".into())
        );
    }

    #[test]
    fn fill_from_checks_type_and_len() {
        let mut arr = NdArray::zeros(ElementType::U8, vec![2, 2]);
        arr.fill_from(ArrayData::U8(vec![1, 2, 3, 4])).expect("fill");
        assert_eq!(arr.data(), &ArrayData::U8(vec![1, 2, 3, 4]));
        assert!(arr.fill_from(ArrayData::U16(vec![1, 2, 3, 4])).is_err());
        assert!(arr.fill_from(ArrayData::U8(vec![1, 2, 3])).is_err());
    }

    #[test]
    fn shared_recording_requires_ready_for_consumers() {
        let rec = Recording::new("/cam");
        let shared = SharedRecording::new(rec);
        assert_eq!(
            shared.read_ready().unwrap_err(),
            RecmathError::NotReady("/cam".into())
        );
        {
            let mut w = shared.write().expect("write");
            w.define_array("image", small_array()).expect("define");
            w.mark_metadata_done().expect("metadata");
            w.mark_data_ready().expect("ready");
        }
        assert!(shared.read_ready().is_ok());
        assert_eq!(shared.snapshot().expect("snapshot").num_arrays(), 1);
    }

    #[test]
    fn element_types_map_to_sample_kinds() {
        assert_eq!(ElementType::U8.sample_kind(), Some(SampleKind::U8));
        assert_eq!(ElementType::F32.sample_kind(), Some(SampleKind::F32));
        assert_eq!(ElementType::I32.sample_kind(), None);
        assert_eq!(ElementType::from(SampleKind::U16), ElementType::U16);
        assert_eq!(ElementType::I32.to_string(), "int32");
    }
}
