//! Error types for the uartbridge crate.

use crate::types::Chipset;

/// The error type for serial bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the nusb USB layer.
    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    /// A USB transfer error.
    #[error("USB transfer error: {0}")]
    Transfer(#[from] nusb::transfer::TransferError),

    /// No serial port has been selected.
    #[error("serial port is not selected")]
    PortNotSelected,

    /// The host has no usable USB host stack.
    #[error("USB host feature is not supported")]
    UsbHostUnavailable,

    /// The selected port is not attached any more.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The claimed interface has no bulk IN/OUT endpoint pair.
    #[error("invalid serial port endpoint")]
    EndpointNotFound,

    /// No chipset driver matches the device identity.
    #[error("unknown chipset: vendor id {vendor_id:#06x} product id {product_id:#06x}")]
    UnknownChipset {
        /// USB vendor ID of the device.
        vendor_id: u16,
        /// USB product ID of the device.
        product_id: u16,
    },

    /// The chipset cannot run at the requested baud rate.
    #[error("unsupported baud rate {baud_rate} for {chipset:?}")]
    UnsupportedBaudRate {
        /// The chipset that rejected the rate.
        chipset: Chipset,
        /// The requested baud rate.
        baud_rate: u32,
    },

    /// The chipset cannot use the requested line setting.
    #[error("unsupported {setting} for {chipset:?}")]
    UnsupportedLineSetting {
        /// The chipset that rejected the setting.
        chipset: Chipset,
        /// Which setting was rejected.
        setting: &'static str,
    },

    /// Invalid argument(s) were provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A control transfer failed or moved fewer bytes than required.
    #[error("control transfer {request:#04x} failed: {reason}")]
    ControlTransfer {
        /// The request code of the failed transfer.
        request: u8,
        /// What went wrong.
        reason: String,
    },

    /// A bulk write moved fewer bytes than the chunk size.
    #[error("data send failed: wrote {actual} of {expected} bytes")]
    ShortWrite {
        /// Bytes in the chunk.
        expected: usize,
        /// Bytes the device accepted.
        actual: usize,
    },

    /// The chipset has no hardware support for the operation.
    #[error("operation not supported by chipset {0:?}")]
    Unsupported(Chipset),

    /// The serial port is not open.
    #[error("serial port is not open")]
    NotOpen,

    /// The device has been disconnected.
    #[error("USB device disconnected")]
    Disconnected,

    /// The receive thread could not be started.
    #[error("unable to start receive thread: {0}")]
    Thread(#[source] std::io::Error),

    /// The settings text could not be parsed.
    #[error("settings error: {0}")]
    Settings(String),

    /// XML tokenizer error while reading settings.
    #[error("settings XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Broad classes of [`Error`], used to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or unsupported configuration. The connection stays closed.
    Configuration,
    /// The USB transport failed.
    Transport,
    /// The chipset lacks the feature. The connection is still usable.
    Unsupported,
    /// The operation does not fit the current port state.
    State,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PortNotSelected
            | Self::UsbHostUnavailable
            | Self::EndpointNotFound
            | Self::UnknownChipset { .. }
            | Self::UnsupportedBaudRate { .. }
            | Self::UnsupportedLineSetting { .. }
            | Self::InvalidArgument(_)
            | Self::Settings(_)
            | Self::Xml(_) => ErrorKind::Configuration,
            Self::Usb(_)
            | Self::Transfer(_)
            | Self::DeviceNotFound(_)
            | Self::ControlTransfer { .. }
            | Self::ShortWrite { .. }
            | Self::Disconnected
            | Self::Thread(_) => ErrorKind::Transport,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::NotOpen => ErrorKind::State,
        }
    }

    /// Whether the chipset simply lacks the requested feature.
    pub fn is_unsupported(&self) -> bool {
        self.kind() == ErrorKind::Unsupported
    }

    /// Whether the underlying device handle is gone.
    pub fn is_disconnected(&self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::Transfer(nusb::transfer::TransferError::Disconnected)
        )
    }
}

/// A specialized `Result` type for serial bridge operations.
pub type Result<T> = std::result::Result<T, Error>;
