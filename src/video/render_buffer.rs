//! Logical float buffers backed by a small pool of device buffers each.
//!
//! Every logical buffer keeps its contents in main memory. When a draw needs it on the device
//! after it was written, the pool rotates to a physical buffer the device is done with, so a
//! write never lands in a buffer an in-flight draw still reads. A physical buffer is done once
//! `frames_in_flight` frames have passed since its last use.

use crate::utils::{HandlePool, Table};

use super::backends::{BufferObject, Device};
use super::errors::*;
use super::settings::VideoParams;
use super::types::RenderBufferId;

#[derive(Debug, Clone, Copy)]
struct Physical {
    object: BufferObject,
    /// Floats allocated on the device.
    len: usize,
    /// The frame of the last draw that used it.
    fence: Option<u64>,
}

#[derive(Debug)]
struct LogicalBuffer {
    data: Vec<f32>,
    pool: Vec<Physical>,
    current: Option<usize>,
    dirty: bool,
}

/// Counters of the physical buffers, mostly for diagnosis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderBufferStats {
    pub logical: usize,
    pub physical: usize,
    pub spare: usize,
    pub retired: usize,
}

pub struct RenderBufferPool {
    depth: usize,
    frames_in_flight: u64,
    preclaimed: usize,
    frame: u64,
    buffers: Table<RenderBufferId, LogicalBuffer>,
    spare: Vec<Physical>,
    retired: Vec<Physical>,
    objects: HandlePool<BufferObject>,
}

impl RenderBufferPool {
    /// Creates the pool and `preclaimed_buffers` empty device buffers up front.
    pub fn new<D: Device>(device: &mut D, params: &VideoParams) -> Result<Self> {
        let mut pool = RenderBufferPool {
            depth: params.buffer_pool_depth.max(1),
            frames_in_flight: params.frames_in_flight,
            preclaimed: params.preclaimed_buffers,
            frame: 0,
            buffers: Table::new(),
            spare: Vec::with_capacity(params.preclaimed_buffers),
            retired: Vec::new(),
            objects: HandlePool::new(),
        };

        for _ in 0..params.preclaimed_buffers {
            let object = pool.objects.create();
            unsafe { device.create_buffer(object, &[])? };
            pool.spare.push(Physical {
                object,
                len: 0,
                fence: None,
            });
        }

        Ok(pool)
    }

    /// Mints a device buffer handle that is not managed by the pool.
    pub fn claim_object(&mut self) -> BufferObject {
        self.objects.create()
    }

    pub fn add(&mut self, data: &[f32]) -> RenderBufferId {
        self.buffers.insert(LogicalBuffer {
            data: data.to_vec(),
            pool: Vec::new(),
            current: None,
            dirty: true,
        })
    }

    /// Overwrites floats starting at `offset`.
    pub fn update(&mut self, id: RenderBufferId, offset: usize, data: &[f32]) -> Result<()> {
        let buffer = self.buffers.find_mut(id)?;
        let end = Self::range(id, offset, data.len(), buffer.data.len())?;

        buffer.data[offset..end].copy_from_slice(data);
        buffer.dirty = true;
        Ok(())
    }

    /// Copies floats starting at `offset` into `out`.
    pub fn read(&self, id: RenderBufferId, offset: usize, out: &mut [f32]) -> Result<()> {
        let buffer = self.buffers.find(id)?;
        let end = Self::range(id, offset, out.len(), buffer.data.len())?;

        out.copy_from_slice(&buffer.data[offset..end]);
        Ok(())
    }

    pub fn size(&self, id: RenderBufferId) -> Option<usize> {
        self.buffers.get(id).map(|v| v.data.len())
    }

    /// The contents of a buffer as last written.
    pub fn data(&self, id: RenderBufferId) -> Option<&[f32]> {
        self.buffers.get(id).map(|v| v.data.as_slice())
    }

    #[inline]
    pub fn contains(&self, id: RenderBufferId) -> bool {
        self.buffers.is_alive(id)
    }

    /// Removes a buffer. Its device buffers are recycled once no draw uses them anymore.
    pub fn remove(&mut self, id: RenderBufferId) -> bool {
        match self.buffers.remove(id) {
            Some(buffer) => {
                self.retired.extend(buffer.pool);
                true
            }
            None => false,
        }
    }

    /// Returns an up-to-date device buffer of `id` for a draw issued in the current frame.
    pub fn bind<D: Device>(&mut self, device: &mut D, id: RenderBufferId) -> Result<BufferObject> {
        let frame = self.frame;
        let frames_in_flight = self.frames_in_flight;
        let depth = self.depth;

        let buffer = self.buffers.find_mut(id)?;
        if let (false, Some(current)) = (buffer.dirty, buffer.current) {
            let physical = &mut buffer.pool[current];
            physical.fence = Some(frame);
            return Ok(physical.object);
        }

        let idle = |p: &Physical| match p.fence {
            Some(fence) => fence + frames_in_flight <= frame,
            None => true,
        };

        let index = if let Some(i) = buffer.pool.iter().position(|p| idle(p)) {
            i
        } else if buffer.pool.len() < depth {
            let physical = match self.spare.pop() {
                Some(v) => v,
                None => Physical {
                    object: self.objects.create(),
                    len: 0,
                    fence: None,
                },
            };

            buffer.pool.push(physical);
            buffer.pool.len() - 1
        } else {
            trace!("[RenderBufferPool] {} exhausted its pool, reusing the oldest.", id);
            buffer
                .pool
                .iter()
                .enumerate()
                .min_by_key(|&(_, p)| p.fence)
                .map(|(i, _)| i)
                .unwrap_or(0)
        };

        let physical = &mut buffer.pool[index];
        unsafe {
            if physical.len == buffer.data.len() && physical.fence.is_some() {
                device.update_buffer(physical.object, 0, &buffer.data)?;
            } else {
                device.create_buffer(physical.object, &buffer.data)?;
                physical.len = buffer.data.len();
            }
        }

        physical.fence = Some(frame);
        buffer.current = Some(index);
        buffer.dirty = false;
        Ok(physical.object)
    }

    /// Moves the frame fence. Device buffers that finished their frames are handed back to the
    /// spare list, and spares beyond the preclaimed count are deleted.
    pub fn advance<D: Device>(&mut self, device: &mut D) -> Result<()> {
        self.frame += 1;

        let frame = self.frame;
        let frames_in_flight = self.frames_in_flight;
        let idle = |p: &Physical| match p.fence {
            Some(fence) => fence + frames_in_flight <= frame,
            None => true,
        };

        for buffer in self.buffers.values_mut() {
            let current = buffer.current.map(|i| buffer.pool[i].object);
            let mut i = 0;
            while i < buffer.pool.len() {
                let p = buffer.pool[i];
                if Some(p.object) != current && idle(&p) {
                    self.spare.push(buffer.pool.swap_remove(i));
                } else {
                    i += 1;
                }
            }

            buffer.current = current.and_then(|v| buffer.pool.iter().position(|p| p.object == v));
        }

        let mut i = 0;
        while i < self.retired.len() {
            if idle(&self.retired[i]) {
                let p = self.retired.swap_remove(i);
                self.spare.push(p);
            } else {
                i += 1;
            }
        }

        while self.spare.len() > self.preclaimed {
            if let Some(p) = self.spare.pop() {
                unsafe { device.delete_buffer(p.object)? };
                self.objects.free(p.object);
            }
        }

        Ok(())
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn stats(&self) -> RenderBufferStats {
        RenderBufferStats {
            logical: self.buffers.len(),
            physical: self.buffers.values().map(|v| v.pool.len()).sum(),
            spare: self.spare.len(),
            retired: self.retired.len(),
        }
    }

    fn range(id: RenderBufferId, offset: usize, count: usize, len: usize) -> Result<usize> {
        match offset.checked_add(count) {
            Some(end) if end <= len => Ok(end),
            _ => Err(Error::OutOfRange {
                name: format!("{}", id),
                offset,
                end: offset.saturating_add(count),
                len,
            }),
        }
    }
}
