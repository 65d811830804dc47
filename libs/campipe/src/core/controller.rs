// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Device-level entry point.
//!
//! The controller checks client requests against the product configuration
//! before anything reaches the graph, so a bad index fails the one request
//! and nothing else.

use crate::core::config::{DeviceInfo, ExternalConfig, PipelineSettings, ProductConfig};
use crate::core::error::{PipelineError, Result};
use crate::core::hardware::PipelineHardware;
use crate::core::manager::{
    ManagerState, PendingReply, PipelineManager, StreamClient, StreamRequest,
};

/// A client's request for one stream of one config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateStreamRequest {
    pub config_index: u32,
    pub stream_index: u32,
    pub image_format_index: u32,
    /// Frames the client intends to hold at once.
    pub buffer_count: u32,
}

pub struct Controller {
    config: ProductConfig,
    manager: PipelineManager,
    active_config: Option<usize>,
}

impl Controller {
    /// Validates `config`; a broken product configuration is refused here.
    pub fn new(
        config: ProductConfig,
        hardware: PipelineHardware,
        settings: PipelineSettings,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            manager: PipelineManager::new(hardware, settings),
            active_config: None,
        })
    }

    pub fn get_configs(&self) -> &[ExternalConfig] {
        &self.config.external_configs
    }

    pub fn get_device_info(&self) -> &DeviceInfo {
        &self.config.device_info
    }

    pub fn active_config(&self) -> Option<usize> {
        self.active_config
    }

    pub fn manager(&self) -> &PipelineManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut PipelineManager {
        &mut self.manager
    }

    /// Make `config_index` the active configuration. A running graph is
    /// shut down first; the reply arrives once the new roots are installed.
    pub fn set_config(&mut self, config_index: u32) -> PendingReply<()> {
        let index = config_index as usize;
        let Some(roots) = self.config.roots(index) else {
            return PendingReply::ready(Err(PipelineError::InvalidArgs(format!(
                "config index {} out of range ({} configs)",
                config_index,
                self.config.internal_configs.len()
            ))));
        };
        let roots = roots.to_vec();
        if self.active_config == Some(index) && self.manager.state() == ManagerState::Configured {
            return PendingReply::ready(Ok(()));
        }
        self.active_config = Some(index);
        tracing::info!("Activating config {}", config_index);

        match self.manager.state() {
            ManagerState::Uninitialized => PendingReply::ready(self.manager.set_roots(roots)),
            _ => self.manager.shutdown_and_reconfigure(roots),
        }
    }

    pub fn create_stream(&mut self, request: CreateStreamRequest) -> PendingReply<StreamClient> {
        match self.validate_stream_request(&request) {
            Ok(stream_request) => self.manager.create_stream(stream_request),
            Err(e) => {
                tracing::warn!("Rejected stream request {:?}: {}", request, e);
                PendingReply::ready(Err(e))
            }
        }
    }

    fn validate_stream_request(&self, request: &CreateStreamRequest) -> Result<StreamRequest> {
        let config_index = request.config_index as usize;
        let Some(external) = self.config.external_configs.get(config_index) else {
            return Err(PipelineError::InvalidArgs(format!(
                "config index {} out of range",
                request.config_index
            )));
        };
        if self.active_config != Some(config_index) {
            return Err(PipelineError::BadState(format!(
                "config {} is not active",
                request.config_index
            )));
        }
        let stream = external
            .streams
            .get(request.stream_index as usize)
            .ok_or_else(|| {
                PipelineError::InvalidArgs(format!(
                    "stream index {} out of range for config {}",
                    request.stream_index, request.config_index
                ))
            })?;
        if request.image_format_index as usize >= stream.image_formats.len() {
            return Err(PipelineError::InvalidArgs(format!(
                "image format index {} out of range for {}",
                request.image_format_index, stream.stream_type
            )));
        }
        if request.buffer_count == 0 {
            return Err(PipelineError::InvalidArgs("buffer count must be nonzero".into()));
        }
        Ok(StreamRequest {
            stream_type: stream.stream_type,
            image_format_index: request.image_format_index,
            buffer_count: request.buffer_count,
        })
    }

    pub fn enable_streaming(&mut self) {
        self.manager.set_streaming_enabled(true);
    }

    pub fn disable_streaming(&mut self) {
        self.manager.set_streaming_enabled(false);
    }

    /// Shut the graph down and forget the active config.
    pub fn shutdown(&mut self) -> PendingReply<()> {
        self.active_config = None;
        self.manager.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hardware::fake::VirtualHardware;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(2);

    const PRODUCT: &str = r#"
device_info: { vendor_name: Example, product_name: Bench Camera }
external_configs:
  - streams:
      - stream_type: MONITORING
        frame_rate: { numerator: 30 }
        image_formats:
          - { pixel_format: nv12, width: 1280, height: 720, bytes_per_row: 1280 }
internal_configs:
  - frame_rate_range: { min: { numerator: 30 }, max: { numerator: 30 } }
    roots:
      - kind: { type: input }
        frame_rate: { numerator: 30 }
        supported_streams: [{ stream_type: MONITORING }]
        output_constraints: { min_buffer_count_for_camping: 2 }
        image_formats:
          - { pixel_format: nv12, width: 1280, height: 720, bytes_per_row: 1280 }
        children:
          - kind: { type: output }
            frame_rate: { numerator: 30 }
            supported_streams: [{ stream_type: MONITORING }]
            input_constraints: { min_buffer_count_for_camping: 2 }
"#;

    fn controller() -> Controller {
        Controller::new(
            ProductConfig::from_yaml_str(PRODUCT).unwrap(),
            VirtualHardware::new().hardware(),
            PipelineSettings::default(),
        )
        .unwrap()
    }

    fn request() -> CreateStreamRequest {
        CreateStreamRequest {
            config_index: 0,
            stream_index: 0,
            image_format_index: 0,
            buffer_count: 2,
        }
    }

    fn expect_invalid(controller: &mut Controller, request: CreateStreamRequest) {
        let pending = controller.create_stream(request);
        assert!(matches!(
            pending.try_take(),
            Some(Err(PipelineError::InvalidArgs(_)))
        ));
    }

    #[test]
    fn test_discovery() {
        let controller = controller();
        assert_eq!(controller.get_device_info().product_name, "Bench Camera");
        assert_eq!(controller.get_configs().len(), 1);
        assert_eq!(controller.active_config(), None);
    }

    #[test]
    fn test_requests_validated_before_graph() {
        let mut controller = controller();
        let inactive = controller.create_stream(request());
        assert!(matches!(
            inactive.try_take(),
            Some(Err(PipelineError::BadState(_)))
        ));

        controller.set_config(0).wait().unwrap();
        expect_invalid(
            &mut controller,
            CreateStreamRequest {
                config_index: 3,
                ..request()
            },
        );
        expect_invalid(
            &mut controller,
            CreateStreamRequest {
                stream_index: 1,
                ..request()
            },
        );
        expect_invalid(
            &mut controller,
            CreateStreamRequest {
                image_format_index: 1,
                ..request()
            },
        );
        expect_invalid(
            &mut controller,
            CreateStreamRequest {
                buffer_count: 0,
                ..request()
            },
        );
        assert!(controller.set_config(4).wait().is_err());
        assert_eq!(controller.manager().graph().len(), 0);
    }

    #[test]
    fn test_create_stream_and_shutdown() {
        let mut controller = controller();
        controller.set_config(0).wait().unwrap();

        let pending = controller.create_stream(request());
        let client = controller.manager_mut().resolve(pending, TIMEOUT).unwrap();
        assert_eq!(controller.manager().graph().len(), 2);

        drop(client);
        let pending = controller.shutdown();
        controller.manager_mut().resolve(pending, TIMEOUT).unwrap();
        assert_eq!(controller.manager().state(), ManagerState::Uninitialized);
        assert!(controller.manager().graph().is_empty());
    }

    #[test]
    fn test_set_config_while_running_reinstalls_roots() {
        let mut controller = controller();
        controller.set_config(0).wait().unwrap();
        let pending = controller.create_stream(request());
        let _client = controller.manager_mut().resolve(pending, TIMEOUT).unwrap();

        // Re-activating the active config is a no-op.
        assert!(controller.set_config(0).try_take().unwrap().is_ok());
        assert_eq!(controller.manager().graph().len(), 2);

        controller.active_config = None;
        let pending = controller.set_config(0);
        controller.manager_mut().resolve(pending, TIMEOUT).unwrap();
        assert_eq!(controller.manager().state(), ManagerState::Configured);
        assert!(controller.manager().graph().is_empty());
        assert_eq!(controller.manager().stream_count(), 0);

        let pending = controller.shutdown();
        controller.manager_mut().resolve(pending, TIMEOUT).unwrap();
    }
}
