//! Per-thread attachment state
//!
//! Each thread keeps a list of the VMs it is attached to. The list is a
//! thread-local whose destructor detaches every still-live attachment, so a
//! thread that exits after calling into the VM leaves no attachment behind.
//!
//! Each thread also keeps the stack of call frames it has open. Local frames
//! nest in the VM, so closing a frame closes every frame opened after it.

use std::cell::RefCell;
use std::sync::Weak;

use super::ForeignCallGateway;
use crate::error::{BridgeError, Result};
use crate::native::RawEnv;

struct Attachment {
    vm: u64,
    gateway: Weak<ForeignCallGateway>,
    /// Failed attachments are remembered so the thread fails fast
    env: std::result::Result<RawEnv, i32>,
}

#[derive(Default)]
struct ThreadAttachments(Vec<Attachment>);

impl Drop for ThreadAttachments {
    fn drop(&mut self) {
        for attachment in self.0.drain(..) {
            if attachment.env.is_err() {
                continue;
            }
            if let Some(gateway) = attachment.gateway.upgrade() {
                gateway.detach_exiting_thread();
            }
        }
    }
}

thread_local! {
    static ATTACHMENTS: RefCell<ThreadAttachments> = RefCell::new(ThreadAttachments::default());
    /// Open frames as `(vm, frame)`, innermost last
    static OPEN_FRAMES: RefCell<Vec<(u64, u64)>> = RefCell::new(Vec::new());
}

/// Environment of the current thread for `gateway`, attaching on first use
pub(super) fn current_env(gateway: &ForeignCallGateway) -> Result<RawEnv> {
    ATTACHMENTS
        .try_with(|cell| {
            let mut list = cell.borrow_mut();
            if let Some(existing) = list.0.iter().find(|a| a.vm == gateway.vm_id()) {
                return existing.env.map_err(|code| BridgeError::Attach { code });
            }
            list.0.retain(|a| a.gateway.strong_count() > 0);

            let env = unsafe { gateway.native().attach_current_thread() };
            match env {
                Ok(_) => log::debug!("Attached {:?} to VM {}", std::thread::current().id(), gateway.vm_id()),
                Err(code) => log::debug!("Attach of {:?} failed with {}", std::thread::current().id(), code),
            }
            list.0.push(Attachment {
                vm: gateway.vm_id(),
                gateway: gateway.weak(),
                env,
            });
            env.map_err(|code| BridgeError::Attach { code })
        })
        .map_err(|_| BridgeError::Attach {
            code: jvm_bridge_sys::JNI_EDETACHED,
        })?
}

/// Environment of the current thread if it is already attached. Never attaches.
pub(super) fn existing_env(gateway: &ForeignCallGateway) -> Option<RawEnv> {
    ATTACHMENTS
        .try_with(|cell| {
            let list = cell.try_borrow().ok()?;
            list.0
                .iter()
                .find(|a| a.vm == gateway.vm_id())
                .and_then(|a| a.env.ok())
        })
        .ok()
        .flatten()
}

/// Forget the current thread's attachment without detaching
pub(super) fn forget(gateway: &ForeignCallGateway) {
    let _ = ATTACHMENTS.try_with(|cell| {
        if let Ok(mut list) = cell.try_borrow_mut() {
            list.0.retain(|a| a.vm != gateway.vm_id());
        }
    });
}

/// Record a frame opened on this thread
pub(super) fn enter_frame(vm: u64, frame: u64) {
    let _ = OPEN_FRAMES.try_with(|cell| cell.borrow_mut().push((vm, frame)));
}

/// Remove `frame` and every frame of the same VM opened after it.
///
/// Returns the removed frame ids innermost first. Empty when `frame` was
/// already closed along with an enclosing frame.
pub(super) fn leave_frame(vm: u64, frame: u64) -> Vec<u64> {
    OPEN_FRAMES
        .try_with(|cell| {
            let mut open = cell.borrow_mut();
            let Some(start) = open.iter().position(|&entry| entry == (vm, frame)) else {
                return Vec::new();
            };
            let mut closed = Vec::new();
            for index in (start..open.len()).rev() {
                if open[index].0 == vm {
                    closed.push(open.remove(index).1);
                }
            }
            closed
        })
        .unwrap_or_else(|_| vec![frame])
}

/// Number of frames of `vm` open on this thread
pub(super) fn open_frames(vm: u64) -> usize {
    OPEN_FRAMES
        .try_with(|cell| cell.borrow().iter().filter(|entry| entry.0 == vm).count())
        .unwrap_or(0)
}
