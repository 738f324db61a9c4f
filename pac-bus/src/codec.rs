//! Codec descriptors and the host-side plug-in table.

use bitflags::bitflags;

use crate::{
    encoder::{PacEncoder, Settings, VideoEncoder},
    error::PacError,
    frame::PixelFormat,
    pac::PacLibrary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Video,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// Accepts a null frame at end of stream to flush.
        const DELAY = 1 << 5;
        const AUTO_THREADS = 1 << 15;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InternalCaps: u32 {
        /// The host calls close even when init failed.
        const INIT_CLEANUP = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOption {
    pub name: &'static str,
    pub help: &'static str,
}

#[derive(Debug, PartialEq, Eq)]
pub struct CodecDescriptor {
    pub name: &'static str,
    pub long_name: &'static str,
    pub media_type: MediaType,
    pub pix_fmts: &'static [PixelFormat],
    pub capabilities: Capabilities,
    pub internal_caps: InternalCaps,
    pub options: &'static [CodecOption],
}

impl CodecDescriptor {
    pub fn supports(&self, format: PixelFormat) -> bool {
        self.pix_fmts.contains(&format)
    }
}

pub static PAC_PLUGIN: CodecDescriptor = CodecDescriptor {
    name: "pac_plugin",
    long_name: "PAC Plug-in TEST",
    media_type: MediaType::Video,
    pix_fmts: &[PixelFormat::Uyvy422],
    capabilities: Capabilities::AUTO_THREADS.union(Capabilities::DELAY),
    internal_caps: InternalCaps::INIT_CLEANUP,
    options: &[],
};

pub type EncoderFactory =
    Box<dyn Fn(&Settings) -> Result<Box<dyn VideoEncoder>, PacError> + Send + Sync>;

struct Entry {
    descriptor: &'static CodecDescriptor,
    factory: EncoderFactory,
}

#[derive(Default)]
pub struct CodecRegistry {
    entries: Vec<Entry>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an encoder. A later registration under the same name shadows the earlier one.
    pub fn register(&mut self, descriptor: &'static CodecDescriptor, factory: EncoderFactory) {
        log::debug!("register encoder: {}", descriptor.name);
        self.entries.push(Entry {
            descriptor,
            factory,
        });
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().rev().find(|e| e.descriptor.name == name)
    }

    pub fn find_encoder(&self, name: &str) -> Option<&'static CodecDescriptor> {
        self.entry(name).map(|e| e.descriptor)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &'static CodecDescriptor> + '_ {
        self.entries.iter().map(|e| e.descriptor)
    }

    pub fn open(&self, name: &str, settings: &Settings) -> Result<Box<dyn VideoEncoder>, PacError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| PacError::CodecNotFound(name.to_string()))?;
        if !entry.descriptor.supports(settings.pixel_format) {
            return Err(PacError::UnsupportedPixelFormat(settings.pixel_format));
        }
        log::info!(
            "opening encoder {} ({}x{})",
            entry.descriptor.name,
            settings.width,
            settings.height
        );
        (entry.factory)(settings)
    }
}

/// Registers `pac_plugin`, building a fresh library handle for every opened encoder.
pub fn register_pac_plugin<L, F>(registry: &mut CodecRegistry, make_library: F)
where
    L: PacLibrary + Send + 'static,
    F: Fn() -> Result<L, PacError> + Send + Sync + 'static,
{
    registry.register(
        &PAC_PLUGIN,
        Box::new(move |settings: &Settings| {
            let library = make_library()?;
            let encoder = PacEncoder::new(settings.clone(), library)?;
            Ok(Box::new(encoder) as Box<dyn VideoEncoder>)
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pac::RawPac;

    #[test]
    fn test_pac_plugin_descriptor() {
        assert_eq!(PAC_PLUGIN.name, "pac_plugin");
        assert_eq!(PAC_PLUGIN.media_type, MediaType::Video);
        assert!(PAC_PLUGIN.supports(PixelFormat::Uyvy422));
        assert!(!PAC_PLUGIN.supports(PixelFormat::Yuv420p));
        assert!(PAC_PLUGIN.capabilities.contains(Capabilities::DELAY));
        assert!(PAC_PLUGIN.internal_caps.contains(InternalCaps::INIT_CLEANUP));
        assert!(PAC_PLUGIN.options.is_empty());
    }

    #[test]
    fn test_registry_open() -> anyhow::Result<()> {
        let mut registry = CodecRegistry::new();
        register_pac_plugin(&mut registry, || Ok(RawPac::default()));

        assert_eq!(registry.find_encoder("pac_plugin"), Some(&PAC_PLUGIN));
        assert!(registry.find_encoder("libx264").is_none());
        assert_eq!(registry.descriptors().count(), 1);

        let mut encoder = registry.open("pac_plugin", &Settings::default())?;
        assert_eq!(encoder.descriptor().name, "pac_plugin");
        encoder.close();
        Ok(())
    }

    #[test]
    fn test_registry_rejects_unknown_and_unsupported() {
        let mut registry = CodecRegistry::new();
        register_pac_plugin(&mut registry, || Ok(RawPac::default()));

        let missing = registry.open("nope", &Settings::default());
        assert!(matches!(missing, Err(PacError::CodecNotFound(name)) if name == "nope"));

        let settings = Settings {
            pixel_format: PixelFormat::Nv12,
            ..Settings::default()
        };
        let unsupported = registry.open("pac_plugin", &settings);
        assert!(matches!(
            unsupported,
            Err(PacError::UnsupportedPixelFormat(PixelFormat::Nv12))
        ));
    }

    #[test]
    fn test_factory_error_propagates() {
        let mut registry = CodecRegistry::new();
        register_pac_plugin(&mut registry, || -> Result<RawPac, PacError> {
            Err(PacError::LibraryBusy)
        });
        let res = registry.open("pac_plugin", &Settings::default());
        assert!(matches!(res, Err(PacError::LibraryBusy)));
    }
}
