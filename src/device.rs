use candle_core::Device;
use tracing::{info, warn};

/// Picks the accelerator compiled in, if one answers, else the CPU.
///
/// Never fails: an unavailable accelerator is logged and skipped.
pub fn select_device(force_cpu: bool) -> Device {
    if force_cpu {
        info!("CPU forced from the command line");
        return Device::Cpu;
    }

    #[cfg(feature = "cuda")]
    match Device::new_cuda(0) {
        Ok(device) => return device,
        Err(e) => warn!("CUDA unavailable ({}), trying next backend", e),
    }

    #[cfg(feature = "metal")]
    match Device::new_metal(0) {
        Ok(device) => return device,
        Err(e) => warn!("Metal unavailable ({}), trying next backend", e),
    }

    if cfg!(any(feature = "cuda", feature = "metal")) {
        warn!("No accelerator answered, generating on CPU");
    }
    Device::Cpu
}

pub fn device_label(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "CPU",
        Device::Cuda(_) => "CUDA",
        Device::Metal(_) => "Metal",
    }
}
