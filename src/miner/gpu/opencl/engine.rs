// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/miner/gpu/opencl/engine.rs
//
// OpenCL double-SHA256 engine. One kernel dispatch covers one nonce batch:
// every work item hashes a single nonce and the first item to meet the target
// claims the result slot. Found nonces are re-verified on the CPU by the
// worker before they are reported.

use std::ptr;

use anyhow::{Error, Result};
use log::{debug, info};
use opencl3::{
    command_queue::CommandQueue,
    context::Context,
    kernel::{ExecuteKernel, Kernel},
    memory::{Buffer, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE},
    program::Program,
    types::{cl_uchar, cl_uint, CL_FALSE, CL_TRUE},
};

use crate::core::difficulty::difficulty_to_target;
use crate::core::types::{Work, HEADER_LEN};

use super::device::OpenClDevice;

const LOG_TARGET: &str = "forgemine::opencl::engine";

const KERNEL_SOURCE: &str = include_str!("../../../../kernels/opencl/sha256d.cl");
const KERNEL_NAME: &str = "sha256d_search";

/// GPU hashing engine bound to one device. Owned by the GPU worker thread
/// and never shared.
pub struct Sha256dEngine {
    device_name: String,
    // Held so the device context outlives the queue and buffers.
    #[allow(dead_code)]
    context: Context,
    queue: CommandQueue,
    kernel: Kernel,
    header_buffer: Buffer<cl_uchar>,
    target_buffer: Buffer<cl_uchar>,
    result_buffer: Buffer<cl_uint>,
    /// Generation of the work currently uploaded to the device; avoids
    /// re-uploading the header and target on every dispatch.
    loaded_generation: Option<u64>,
}

impl Sha256dEngine {
    pub fn new(device: OpenClDevice) -> Result<Self> {
        let device_name = device.name().to_string();
        let context = Context::from_device(device.device())
            .map_err(|e| Error::msg(format!("OpenCL context creation failed: {}", e)))?;

        let program = match Program::create_and_build_from_source(&context, KERNEL_SOURCE, "") {
            Ok(program) => program,
            Err(e) => {
                return Err(Error::msg(format!("kernel build failed: {}", e)));
            }
        };
        let kernel = Kernel::create(&program, KERNEL_NAME)
            .map_err(|e| Error::msg(format!("kernel creation failed: {}", e)))?;

        let queue = CommandQueue::create_default(&context, 0)
            .map_err(|e| Error::msg(format!("command queue creation failed: {}", e)))?;

        let header_buffer = unsafe {
            Buffer::<cl_uchar>::create(&context, CL_MEM_READ_ONLY, HEADER_LEN, ptr::null_mut())
                .map_err(|e| Error::msg(format!("header buffer creation failed: {}", e)))?
        };
        let target_buffer = unsafe {
            Buffer::<cl_uchar>::create(&context, CL_MEM_READ_ONLY, 32, ptr::null_mut())
                .map_err(|e| Error::msg(format!("target buffer creation failed: {}", e)))?
        };
        // result[0] = found flag, result[1] = winning nonce.
        let result_buffer = unsafe {
            Buffer::<cl_uint>::create(&context, CL_MEM_READ_WRITE, 2, ptr::null_mut())
                .map_err(|e| Error::msg(format!("result buffer creation failed: {}", e)))?
        };

        info!(target: LOG_TARGET, "engine ready on {}", device_name);
        Ok(Self {
            device_name,
            context,
            queue,
            kernel,
            header_buffer,
            target_buffer,
            result_buffer,
            loaded_generation: None,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Dispatch one batch starting at `start_nonce`. Returns the first
    /// qualifying nonce (if any) and the number of hashes attempted.
    pub fn mine(&mut self, work: &Work, start_nonce: u32, batch_size: u32) -> Result<(Option<u32>, u32)> {
        if batch_size == 0 {
            return Ok((None, 0));
        }
        if self.loaded_generation != Some(work.generation) {
            self.upload_work(work)?;
            self.loaded_generation = Some(work.generation);
        }

        let mut result = [0u32; 2];
        unsafe {
            self.queue
                .enqueue_write_buffer(&mut self.result_buffer, CL_FALSE, 0, &result, &[])
                .map_err(|e| Error::msg(format!("result reset failed: {}", e)))?;

            ExecuteKernel::new(&self.kernel)
                .set_arg(&self.header_buffer)
                .set_arg(&self.target_buffer)
                .set_arg(&start_nonce)
                .set_arg(&self.result_buffer)
                .set_global_work_size(batch_size as usize)
                .enqueue_nd_range(&self.queue)
                .map_err(|e| Error::msg(format!("kernel dispatch failed: {}", e)))?;

            self.queue
                .enqueue_read_buffer(&self.result_buffer, CL_TRUE, 0, &mut result, &[])
                .map_err(|e| Error::msg(format!("result read failed: {}", e)))?;
        }

        let found = if result[0] != 0 { Some(result[1]) } else { None };
        Ok((found, batch_size))
    }

    fn upload_work(&mut self, work: &Work) -> Result<()> {
        let target = difficulty_to_target(work.target_difficulty).to_big_endian();
        unsafe {
            self.queue
                .enqueue_write_buffer(&mut self.header_buffer, CL_FALSE, 0, &work.header, &[])
                .map_err(|e| Error::msg(format!("header upload failed: {}", e)))?;
            self.queue
                .enqueue_write_buffer(&mut self.target_buffer, CL_FALSE, 0, &target, &[])
                .map_err(|e| Error::msg(format!("target upload failed: {}", e)))?;
        }
        self.queue
            .finish()
            .map_err(|e| Error::msg(format!("upload sync failed: {}", e)))?;
        debug!(target: LOG_TARGET, "uploaded work generation {}", work.generation);
        Ok(())
    }
}
