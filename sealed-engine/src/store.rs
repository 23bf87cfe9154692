//! Handle store: which handles exist, what type they carry and how they came
//! to be. The store never looks at values.

use crate::{
    backend::ArithmeticBackend,
    engine::ExecutionId,
    error::Error,
    handle::{Handle, HandleId, HandleSource},
    operation::Operation,
    value::ValueType,
};
use im::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Trivial,
    External,
    Random,
    Derived { op: Operation, inputs: Vec<HandleId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleRecord {
    ty: ValueType,
    origin: Origin,
    created_in: ExecutionId,
}

impl HandleRecord {
    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn created_in(&self) -> ExecutionId {
        self.created_in
    }
}

/// Backed by a persistent map, so the copy an execution works on shares its
/// structure with the committed store.
#[derive(Debug, Clone, Default)]
pub struct HandleStore {
    handles: HashMap<HandleId, HandleRecord>,
}

impl HandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if the handle was created by this engine and not collected since.
    pub fn exists(&self, handle: &Handle) -> bool {
        self.handles
            .get(handle.id())
            .map_or(false, |record| record.ty == handle.value_type())
    }

    pub fn get(&self, handle: &Handle) -> Option<&HandleRecord> {
        self.handles
            .get(handle.id())
            .filter(|record| record.ty == handle.value_type())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub(crate) fn require(&self, handle: &Handle) -> Result<&HandleRecord, Error> {
        self.get(handle).ok_or(Error::UnknownHandle(*handle.id()))
    }

    /// create a handle from a public seed or an external ciphertext
    pub(crate) fn create<B: ArithmeticBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        ty: ValueType,
        source: &HandleSource,
        execution: ExecutionId,
    ) -> Result<Handle, Error> {
        let (handle, origin) = match source {
            HandleSource::Plaintext(value) => {
                if value.value_type() != ty {
                    return Err(Error::SeedTypeMismatch {
                        declared: ty,
                        actual: value.value_type(),
                    });
                }
                (backend.encrypt(value)?, Origin::Trivial)
            }
            HandleSource::External(ciphertext) => {
                (backend.import(ty, ciphertext)?, Origin::External)
            }
        };
        self.insert(handle, ty, origin, execution)?;
        Ok(handle)
    }

    pub(crate) fn create_random<B: ArithmeticBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        ty: ValueType,
        execution: ExecutionId,
    ) -> Result<Handle, Error> {
        if ty == ValueType::Address {
            return Err(Error::TypeMismatch {
                op: None,
                operands: vec![ty],
            });
        }
        let handle = backend.random(ty)?;
        self.insert(handle, ty, Origin::Random, execution)?;
        Ok(handle)
    }

    /// Derive a new handle from existing ones. The inputs must exist and
    /// type-check; authorization is the caller's business.
    pub(crate) fn derive<B: ArithmeticBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        op: Operation,
        inputs: &[Handle],
        execution: ExecutionId,
    ) -> Result<Handle, Error> {
        let result_type = self.result_type(op, inputs)?;
        let handle = backend.apply(op, inputs, result_type)?;
        let origin = Origin::Derived {
            op,
            inputs: inputs.iter().map(|h| *h.id()).collect(),
        };
        self.insert(handle, result_type, origin, execution)?;
        debug!(%op, result = ?handle.id(), "derived handle");
        Ok(handle)
    }

    pub(crate) fn result_type(&self, op: Operation, inputs: &[Handle]) -> Result<ValueType, Error> {
        for input in inputs {
            self.require(input)?;
        }
        let operands: Vec<ValueType> = inputs.iter().map(|h| h.value_type()).collect();
        op.result_type(&operands).ok_or(Error::TypeMismatch {
            op: Some(op),
            operands,
        })
    }

    fn insert(
        &mut self,
        handle: Handle,
        ty: ValueType,
        origin: Origin,
        created_in: ExecutionId,
    ) -> Result<(), Error> {
        // a backend handing back a handle we already know would make one
        // handle denote two derivations
        if self.handles.contains_key(handle.id()) || handle.value_type() != ty {
            return Err(Error::BackendAliasedHandle(*handle.id()));
        }
        self.handles.insert(
            *handle.id(),
            HandleRecord {
                ty,
                origin,
                created_in,
            },
        );
        Ok(())
    }

    pub(crate) fn remove(&mut self, handle: &Handle) -> Option<HandleRecord> {
        if self.exists(handle) {
            self.handles.remove(handle.id())
        } else {
            None
        }
    }
}
