use candle_core::Device;
use tracing::info;

/// Pick the best accelerator compiled in, falling back to CPU.
pub fn select_device() -> Device {
    accelerator().unwrap_or_else(|| { info!("device: CPU"); Device::Cpu })
}

/// The first available GPU device, if any. Never returns `Device::Cpu`.
pub fn accelerator() -> Option<Device> {
    #[cfg(feature = "cuda")]
    {
        if candle_core::utils::cuda_is_available() {
            if let Ok(dev) = Device::new_cuda(0) { info!("device: CUDA:0"); return Some(dev); }
        }
    }
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) { info!("device: Metal (MPS)"); return Some(dev); }
    }
    None
}
