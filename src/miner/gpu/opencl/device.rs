// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/miner/gpu/opencl/device.rs
//
// OpenCL device detection. The GPU worker asks for the best suitable device
// and degrades to a parked state when none exists.

use anyhow::{Error, Result};
use log::{debug, info, warn};
use opencl3::{
    device::{Device, CL_DEVICE_TYPE_GPU},
    platform::get_platforms,
};

const LOG_TARGET: &str = "forgemine::opencl::device";

/// One detected OpenCL GPU device.
#[derive(Debug, Clone)]
pub struct OpenClDevice {
    name: String,
    platform_name: String,
    max_work_group_size: usize,
    max_compute_units: u32,
    global_mem_size: u64,
    device: Device,
}

impl OpenClDevice {
    fn new(device: Device, platform_name: String) -> Self {
        let name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
        let max_work_group_size = device.max_work_group_size().unwrap_or(256);
        let max_compute_units = device.max_compute_units().unwrap_or(1);
        let global_mem_size = device.global_mem_size().unwrap_or(0);

        debug!(target: LOG_TARGET,
            "detected {} (CU: {}, WG: {}, MEM: {:.1} GB)",
            name,
            max_compute_units,
            max_work_group_size,
            global_mem_size as f64 / (1024.0 * 1024.0 * 1024.0)
        );

        Self {
            name,
            platform_name,
            max_work_group_size,
            max_compute_units,
            global_mem_size,
            device,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    pub fn max_work_group_size(&self) -> usize {
        self.max_work_group_size
    }

    pub fn max_compute_units(&self) -> u32 {
        self.max_compute_units
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Minimum capability floor for hashing work.
    pub fn is_suitable_for_mining(&self) -> bool {
        self.max_compute_units >= 1
            && self.max_work_group_size >= 64
            && self.global_mem_size >= 256 * 1024 * 1024
    }

    /// Enumerate every GPU device across all platforms.
    pub fn detect_devices() -> Result<Vec<OpenClDevice>> {
        let platforms = get_platforms()
            .map_err(|e| Error::msg(format!("OpenCL platform detection failed: {}", e)))?;

        let mut all_devices = Vec::new();
        for platform in platforms {
            let platform_name = platform.name().unwrap_or_else(|_| "Unknown Platform".to_string());
            match platform.get_devices(CL_DEVICE_TYPE_GPU) {
                Ok(devices) => {
                    for device_id in devices {
                        all_devices.push(OpenClDevice::new(Device::new(device_id), platform_name.clone()));
                    }
                }
                Err(e) => {
                    debug!(target: LOG_TARGET, "no GPU devices on platform {}: {}", platform_name, e);
                }
            }
        }

        if all_devices.is_empty() {
            warn!(target: LOG_TARGET, "no OpenCL GPU devices detected");
        }
        Ok(all_devices)
    }

    /// Pick the most capable suitable device.
    pub fn best_device() -> Result<OpenClDevice> {
        let device = Self::detect_devices()?
            .into_iter()
            .filter(|d| d.is_suitable_for_mining())
            .max_by_key(|d| d.max_compute_units);
        match device {
            Some(device) => {
                info!(target: LOG_TARGET, "selected {} on {}", device.name(), device.platform_name());
                Ok(device)
            }
            None => Err(Error::msg("no suitable OpenCL GPU device")),
        }
    }
}
