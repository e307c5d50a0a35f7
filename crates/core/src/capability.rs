//! Capability requests brokered to the host shell
//!
//! Picking an image and resolving the current location are answered by the
//! host, not by this process. Each kind of request goes through a
//! [`CapabilitySlot`]: the caller issues a request and awaits a
//! [`PendingCapability`], the host answers through [`CapabilitySlot::resolve`],
//! and the answer is delivered exactly once. Only one request per kind is
//! outstanding; a newer request supersedes the older one, which resolves as
//! denied.

use crate::error::{CoreError, CoreResult};
use crate::geo::Coordinates;
use async_trait::async_trait;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Result of a capability request
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityOutcome<T> {
    Granted(T),
    Denied(String),
}

impl<T> CapabilityOutcome<T> {
    #[must_use]
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied(reason.into())
    }

    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }
}

/// Image picked or captured by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    /// Read an image from disk, guessing the MIME type from the extension
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| CoreError::capability(format!("{} is not a file", path.display())))?;
        let mime = mime_for_path(path).to_string();
        Ok(Self {
            file_name,
            mime,
            bytes,
        })
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Awaitable answer to a capability request
pub struct PendingCapability<T> {
    kind: &'static str,
    rx: oneshot::Receiver<CapabilityOutcome<T>>,
}

impl<T> Future for PendingCapability<T> {
    type Output = CapabilityOutcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let kind = self.kind;
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(CapabilityOutcome::denied(format!(
                "{kind} request was dropped by the host"
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// One outstanding request of a given kind
pub struct CapabilitySlot<T> {
    kind: &'static str,
    pending: Mutex<Option<oneshot::Sender<CapabilityOutcome<T>>>>,
}

impl<T> CapabilitySlot<T> {
    #[must_use]
    pub const fn new(kind: &'static str) -> Self {
        Self {
            kind,
            pending: Mutex::new(None),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<CapabilityOutcome<T>>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Issue a request, superseding any outstanding one
    #[must_use]
    pub fn request(&self) -> PendingCapability<T> {
        let (tx, rx) = oneshot::channel();
        if let Some(previous) = self.lock().replace(tx) {
            debug!("Superseding outstanding {} request", self.kind);
            let _ = previous.send(CapabilityOutcome::denied(format!(
                "{} request superseded",
                self.kind
            )));
        }
        PendingCapability {
            kind: self.kind,
            rx,
        }
    }

    /// Deliver the host's answer; returns false if nobody was waiting
    pub fn resolve(&self, outcome: CapabilityOutcome<T>) -> bool {
        let Some(tx) = self.lock().take() else {
            warn!("{} answer arrived with no outstanding request", self.kind);
            return false;
        };
        tx.send(outcome).is_ok()
    }
}

/// Host side of the bridge
#[async_trait]
pub trait HostShell: Send + Sync {
    /// Pick an existing image or capture a new one
    async fn pick_image(&self) -> CapabilityOutcome<ImageAttachment>;

    /// Resolve the current position
    async fn current_location(&self) -> CapabilityOutcome<Coordinates>;
}

/// Image and location request channels
pub struct CapabilityBridge {
    pub image: CapabilitySlot<ImageAttachment>,
    pub location: CapabilitySlot<Coordinates>,
}

impl CapabilityBridge {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            image: CapabilitySlot::new("image"),
            location: CapabilitySlot::new("location"),
        }
    }

    /// Ask `host` for an image through the image channel
    pub async fn pick_image<H: HostShell + ?Sized>(
        &self,
        host: &H,
    ) -> CapabilityOutcome<ImageAttachment> {
        let pending = self.image.request();
        let outcome = host.pick_image().await;
        self.image.resolve(outcome);
        let outcome = pending.await;
        if let CapabilityOutcome::Denied(reason) = &outcome {
            warn!("Image request denied: {reason}");
        }
        outcome
    }

    /// Ask `host` for the current location through the location channel
    pub async fn current_location<H: HostShell + ?Sized>(
        &self,
        host: &H,
    ) -> CapabilityOutcome<Coordinates> {
        let pending = self.location.request();
        let outcome = host.current_location().await;
        self.location.resolve(outcome);
        let outcome = pending.await;
        if let CapabilityOutcome::Denied(reason) = &outcome {
            warn!("Location request denied: {reason}");
        }
        outcome
    }
}

impl Default for CapabilityBridge {
    fn default() -> Self {
        Self::new()
    }
}
