//! Recording backend for tests.
//!
//! Records every call instead of touching a GPU and counts live resources so
//! that release-on-drop is observable.

use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::backend::{Backend, DrawCall, VertexLayout};
use super::error::BackendError;
use super::shader::{ProgramId, ShaderProgram, UniformSlot};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UniformWrite {
    pub handle: u32,
    pub slot: UniformSlot,
    pub data: Vec<u8>,
}

impl UniformWrite {
    pub fn as_f32(&self) -> Vec<f32> {
        self.data
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedDraw {
    pub program: u32,
    pub buffer: u32,
    pub call: DrawCall,
}

#[derive(Debug, Default)]
pub(crate) struct Recording {
    pub programs_created: usize,
    pub buffers_created: usize,
    pub live_programs: usize,
    pub live_buffers: usize,
    pub program_layouts: Vec<VertexLayout>,
    pub buffer_contents: Vec<Vec<f32>>,
    pub uniform_writes: Vec<UniformWrite>,
    pub draws: Vec<RecordedDraw>,
}

pub(crate) struct RecordedProgram {
    pub handle: u32,
    pub id: ProgramId,
    log: Rc<RefCell<Recording>>,
}

impl Drop for RecordedProgram {
    fn drop(&mut self) {
        self.log.borrow_mut().live_programs -= 1;
    }
}

pub(crate) struct RecordedBuffer {
    pub handle: u32,
    log: Rc<RefCell<Recording>>,
}

impl Drop for RecordedBuffer {
    fn drop(&mut self) {
        self.log.borrow_mut().live_buffers -= 1;
    }
}

#[derive(Default)]
pub(crate) struct RecordingBackend {
    log: Rc<RefCell<Recording>>,
    next_handle: u32,
    errors: VecDeque<String>,
    pub fail_programs: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recording(&self) -> Ref<'_, Recording> {
        self.log.borrow()
    }

    pub fn push_error(&mut self, err: impl Into<String>) {
        self.errors.push_back(err.into());
    }

    fn handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl Backend for RecordingBackend {
    type Program = RecordedProgram;
    type VertexBuffer = RecordedBuffer;

    fn create_program(
        &mut self,
        program: &ShaderProgram,
        layout: &VertexLayout,
    ) -> Result<RecordedProgram, BackendError> {
        if self.fail_programs {
            return Err(BackendError::new("program", "refused by test backend"));
        }
        let handle = self.handle();
        {
            let mut log = self.log.borrow_mut();
            log.programs_created += 1;
            log.live_programs += 1;
            log.program_layouts.push(*layout);
        }
        Ok(RecordedProgram {
            handle,
            id: program.id(),
            log: Rc::clone(&self.log),
        })
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<RecordedBuffer, BackendError> {
        let handle = self.handle();
        {
            let mut log = self.log.borrow_mut();
            log.buffers_created += 1;
            log.live_buffers += 1;
            log.buffer_contents.push(data.to_vec());
        }
        Ok(RecordedBuffer {
            handle,
            log: Rc::clone(&self.log),
        })
    }

    fn write_uniform(&mut self, program: &RecordedProgram, slot: UniformSlot, data: &[u8]) {
        self.log.borrow_mut().uniform_writes.push(UniformWrite {
            handle: program.handle,
            slot,
            data: data.to_vec(),
        });
    }

    fn draw(&mut self, program: &RecordedProgram, buffer: &RecordedBuffer, call: DrawCall) {
        self.log.borrow_mut().draws.push(RecordedDraw {
            program: program.handle,
            buffer: buffer.handle,
            call,
        });
    }

    fn take_error(&mut self) -> Option<String> {
        self.errors.pop_front()
    }
}
