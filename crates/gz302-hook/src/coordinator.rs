//! Suspend cycle coordinator.
//!
//! Runs one half of a suspend cycle per process:
//!
//! - **pre** disables wakeup on Thunderbolt NHI and xHCI controllers (except
//!   the one hosting the built-in keyboard), unbinds ASUS HID devices and
//!   unmounted MMC cards, and persists what it changed.
//! - **post** reverses exactly what the store records, resets the keyboard
//!   and lightbar on the USB bus, restores lighting and deletes the store.
//!
//! Every device operation is best effort. A device failure is logged and
//! never becomes a process failure; the hook exits successfully once its
//! arguments parsed.

use std::path::Path;
use std::process::ExitCode;

use chrono::Utc;
use gz302_core::constants::{MMC_BLOCK_DRIVER, RESET_ON_RESUME};
use gz302_core::{CyclePhase, PhaseTracker};
use gz302_hardware::{Classifier, DeviceBus, DeviceOps, MountTable, OpOutcome, SysfsBus};
use gz302_storage::{CycleInfo, StateStore, StoredCycle, TransitionState};
use tracing::{debug, info, warn};

use crate::cli::{HookPhase, SleepAction};
use crate::config::HookConfig;
use crate::restore::{LightingRestore, ProgramRestore, RestoreOutcome};

/// What a post-resume run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostReport {
    /// A stored cycle from this boot was found and reversed.
    pub reversed_store: bool,
    /// Wakeup flags written back to `enabled`.
    pub wakeup_enabled: usize,
    /// MMC cards bound back to mmcblk.
    pub mmc_bound: usize,
    /// USB devices reauthorized.
    pub usb_reset: usize,
    /// HID devices bound back to their driver.
    pub hid_bound: usize,
    /// HID devices the kernel had already rebound, or that were gone.
    pub hid_skipped: usize,
    /// Lighting restore result.
    pub restore: Option<RestoreOutcome>,
}

/// Drives the pre-suspend and post-resume transitions.
pub struct Coordinator<B: DeviceBus, R: LightingRestore> {
    bus: B,
    store: StateStore,
    restore: R,
    config: HookConfig,
    phase: PhaseTracker,
}

impl Coordinator<SysfsBus, ProgramRestore> {
    /// Coordinator over the real sysfs tree, state store and restore program.
    pub fn from_config(config: HookConfig) -> Self {
        let bus = SysfsBus::new(&config.sysfs_root, &config.mounts_path);
        let store = StateStore::new(&config.state_dir);
        let restore = ProgramRestore::new(&config.restore_program, config.restore_timeout());
        Self::new(bus, store, restore, config)
    }
}

impl<B: DeviceBus, R: LightingRestore> Coordinator<B, R> {
    pub fn new(bus: B, store: StateStore, restore: R, config: HookConfig) -> Self {
        let phase = PhaseTracker::starting_at(store.phase());
        Self {
            bus,
            store,
            restore,
            config,
            phase,
        }
    }

    /// Current cycle phase as seen by this process.
    pub fn phase(&self) -> CyclePhase {
        self.phase.current()
    }

    /// Run `phase` and report the process exit code.
    pub async fn run(&mut self, phase: HookPhase, action: Option<SleepAction>) -> ExitCode {
        let action = action
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unspecified".to_string());
        info!(
            phase = %phase,
            action = %action,
            version = gz302_core::VERSION,
            "Sleep hook started"
        );
        match phase {
            HookPhase::Pre => {
                let state = self.run_pre().await;
                info!(
                    nhi = state.nhi_disabled().len(),
                    xhci = state.xhci_disabled().len(),
                    hid = state.hid_unbound().len(),
                    mmc = state.mmc_unbound().len(),
                    "Pre-suspend transition finished"
                );
            }
            HookPhase::Post => {
                let report = self.run_post().await;
                info!(
                    reversed = report.reversed_store,
                    wakeup = report.wakeup_enabled,
                    mmc = report.mmc_bound,
                    usb = report.usb_reset,
                    hid = report.hid_bound,
                    "Post-resume transition finished"
                );
            }
        }
        ExitCode::SUCCESS
    }

    /// Pre-suspend transition. Returns the state it persisted.
    ///
    /// A store left by an earlier `pre` of this boot that never saw a `post`
    /// is extended, not replaced: its entries still describe hardware this
    /// run finds already changed. A store from another boot, or one that
    /// cannot be read, is discarded.
    pub async fn run_pre(&mut self) -> TransitionState {
        let boot_id = read_boot_id(&self.config.boot_id_path);
        let carried = self.carry_over_store(boot_id.as_deref());
        let armed_at = carried.as_ref().and_then(|stored| stored.info.armed_at);
        let mut state = carried.map(|stored| stored.state).unwrap_or_default();

        let classifier = Classifier::new(&self.bus);
        let ops = DeviceOps::new(&self.bus);

        for nhi in classifier.thunderbolt_controllers() {
            let outcome = ops.disable_wakeup_if_enabled(&nhi);
            if outcome.is_applied() {
                state.record_nhi_disabled(nhi);
            }
            self.settle(&outcome).await;
        }

        for xhci in classifier.usb_host_controllers() {
            if self.config.is_keyboard_controller(&xhci.bus_address) {
                debug!(device = %xhci.bus_address, "Keeping keyboard controller wakeup enabled");
                continue;
            }
            let outcome = ops.disable_wakeup_if_enabled(&xhci);
            if outcome.is_applied() {
                state.record_xhci_disabled(xhci);
            }
            self.settle(&outcome).await;
        }

        for hid in classifier.asus_hid_devices() {
            let Some(driver) = hid.driver_name.clone() else {
                debug!(device = %hid.bus_address, "HID device has no driver, nothing to unbind");
                continue;
            };
            state.record_hid_unbound(hid.clone(), driver.as_str());
            let outcome = ops.unbind(&hid, &driver);
            self.settle(&outcome).await;
        }

        match self.bus.mount_table() {
            Ok(raw) => {
                let mounts = MountTable::parse(&raw);
                for mmc in classifier.mmc_block_devices(&mounts) {
                    state.record_mmc_unbound(mmc.clone());
                    let outcome = ops.unbind(&mmc, MMC_BLOCK_DRIVER);
                    self.settle(&outcome).await;
                }
            }
            Err(e) => warn!(error = %e, "Mount table unreadable, leaving MMC devices bound"),
        }

        let mut info = CycleInfo::new(boot_id, Utc::now());
        info.armed_at = armed_at.or(info.armed_at);
        match self.store.save(&state, &info) {
            Ok(()) if self.phase.current() == CyclePhase::Idle => {
                if let Err(e) = self.phase.transition_to(CyclePhase::Armed) {
                    warn!(error = %e, "Unexpected phase");
                }
            }
            Ok(()) => {}
            Err(e) => warn!(
                error = %e,
                "State store not persisted, resume will not reverse this cycle"
            ),
        }
        state
    }

    /// Stored cycle an earlier `pre` of this boot left behind, if any.
    ///
    /// Anything else found in the store is cleared and the phase reset to
    /// idle.
    fn carry_over_store(&mut self, boot_id: Option<&str>) -> Option<StoredCycle> {
        if !self.store.exists() {
            return None;
        }
        match self.store.load() {
            Ok(Some(stored)) if !stored.info.is_from_other_boot(boot_id) => {
                info!(
                    nhi = stored.state.nhi_disabled().len(),
                    xhci = stored.state.xhci_disabled().len(),
                    hid = stored.state.hid_unbound().len(),
                    mmc = stored.state.mmc_unbound().len(),
                    "Extending state store from an earlier pre-suspend"
                );
                return Some(stored);
            }
            Ok(Some(_)) => warn!("Discarding state store from another boot"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Discarding unreadable state store"),
        }
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Stale state store not fully removed");
        }
        self.phase = PhaseTracker::starting_at(CyclePhase::Idle);
        None
    }

    /// Post-resume transition.
    pub async fn run_post(&mut self) -> PostReport {
        let mut report = PostReport::default();
        if self.phase.current() == CyclePhase::Armed {
            if let Err(e) = self.phase.transition_to(CyclePhase::Resuming) {
                warn!(error = %e, "Unexpected phase");
            }
        }
        let state = match self.load_current_cycle() {
            Some(stored) => {
                report.reversed_store = true;
                stored.state
            }
            None => {
                info!("No state store, only resetting USB devices and lighting");
                TransitionState::new()
            }
        };

        let classifier = Classifier::new(&self.bus);
        let ops = DeviceOps::new(&self.bus);

        for device in state.nhi_disabled().iter().chain(state.xhci_disabled()) {
            let outcome = ops.enable_wakeup(device);
            if outcome.is_applied() {
                report.wakeup_enabled += 1;
            }
            self.settle(&outcome).await;
        }

        for mmc in state.mmc_unbound() {
            let outcome = ops.bind(mmc, MMC_BLOCK_DRIVER);
            if outcome.is_applied() {
                report.mmc_bound += 1;
            }
            self.settle(&outcome).await;
        }

        for id in RESET_ON_RESUME {
            for path in classifier.usb_devices_matching(id) {
                ops.set_usb_authorized(&path, false);
                sleep_for(self.config.usb_reset_pause()).await;
                let outcome = ops.set_usb_authorized(&path, true);
                if outcome.is_applied() {
                    report.usb_reset += 1;
                }
                self.settle(&outcome).await;
            }
        }

        if !state.hid_unbound().is_empty() {
            sleep_for(self.config.hid_settle()).await;
            for (hid, driver) in state.hid_unbound() {
                match ops.bind_if_unbound(hid, driver) {
                    OpOutcome::Applied => report.hid_bound += 1,
                    OpOutcome::Skipped(_) => report.hid_skipped += 1,
                    OpOutcome::Failed(_) => {}
                }
            }
        }

        sleep_for(self.config.restore_settle()).await;
        report.restore = Some(self.restore.restore().await);

        match self.store.clear() {
            Ok(()) => {
                if self.phase.current() == CyclePhase::Resuming {
                    if let Err(e) = self.phase.transition_to(CyclePhase::Idle) {
                        warn!(error = %e, "Unexpected phase");
                    }
                }
            }
            Err(e) => warn!(error = %e, "State store not removed"),
        }
        report
    }

    /// Load the stored cycle, discarding one that belongs to another boot.
    fn load_current_cycle(&self) -> Option<StoredCycle> {
        let stored = match self.store.load() {
            Ok(stored) => stored?,
            Err(e) => {
                warn!(error = %e, "State store unreadable, treating as empty");
                return None;
            }
        };

        let boot_id = read_boot_id(&self.config.boot_id_path);
        if stored.info.is_from_other_boot(boot_id.as_deref()) {
            warn!(
                stored = stored.info.boot_id.as_deref().unwrap_or_default(),
                "State store is from another boot, discarding it"
            );
            return None;
        }

        match stored.info.armed_at {
            Some(armed_at) => {
                let asleep = Utc::now().signed_duration_since(armed_at);
                info!(armed_secs = asleep.num_seconds(), "Resuming stored cycle");
            }
            None => info!("Resuming stored cycle of unknown age"),
        }
        Some(stored)
    }

    async fn settle(&self, outcome: &OpOutcome) {
        if !matches!(outcome, OpOutcome::Skipped(_)) {
            sleep_for(self.config.write_settle()).await;
        }
    }
}

async fn sleep_for(duration: std::time::Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Kernel boot id, or `None` if unavailable.
fn read_boot_id(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Some(raw.trim().to_string()).filter(|id| !id.is_empty()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Boot id unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gz302_core::constants::{KEYBOARD_USB_ID, PCI_CLASS_USB4_NHI, PCI_CLASS_XHCI};
    use gz302_hardware::MockBus;
    use tempfile::TempDir;

    use crate::restore::MockRestore;

    fn config(dir: &TempDir) -> HookConfig {
        HookConfig::default()
            .state_dir(dir.path().join("state"))
            .boot_id_path(dir.path().join("boot_id"))
    }

    #[test]
    fn test_read_boot_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("boot_id");
        assert_eq!(read_boot_id(&path), None);

        std::fs::write(&path, "5d1c9f3e-0000\n").unwrap();
        assert_eq!(read_boot_id(&path).as_deref(), Some("5d1c9f3e-0000"));

        std::fs::write(&path, "\n").unwrap();
        assert_eq!(read_boot_id(&path), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_arms_and_post_returns_to_idle() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let bus = MockBus::new();
        bus.add_pci_device("0000:c7:00.5", PCI_CLASS_USB4_NHI, "enabled");
        let restore = MockRestore::default();

        let mut pre =
            Coordinator::new(&bus, StateStore::new(&config.state_dir), &restore, config.clone());
        assert_eq!(pre.phase(), CyclePhase::Idle);
        let state = pre.run_pre().await;
        assert_eq!(state.nhi_disabled().len(), 1);
        assert_eq!(pre.phase(), CyclePhase::Armed);

        let mut post = Coordinator::new(&bus, StateStore::new(&config.state_dir), &restore, config);
        assert_eq!(post.phase(), CyclePhase::Armed);
        let report = post.run_post().await;
        assert!(report.reversed_store);
        assert_eq!(report.wakeup_enabled, 1);
        assert_eq!(post.phase(), CyclePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_pre_stays_armed() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        std::fs::write(&config.boot_id_path, "boot-a\n").unwrap();
        let bus = MockBus::new();
        bus.add_pci_device("0000:c7:00.5", PCI_CLASS_USB4_NHI, "enabled");
        let restore = MockRestore::default();

        let mut pre =
            Coordinator::new(&bus, StateStore::new(&config.state_dir), &restore, config.clone());
        pre.run_pre().await;
        let state = pre.run_pre().await;

        assert_eq!(pre.phase(), CyclePhase::Armed);
        assert_eq!(state.nhi_disabled().len(), 1);
        let stored = StateStore::new(&config.state_dir).load().unwrap().unwrap();
        assert_eq!(stored.state, state);
        assert_eq!(stored.info.boot_id.as_deref(), Some("boot-a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_discards_store_from_other_boot() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        std::fs::write(&config.boot_id_path, "boot-a\n").unwrap();

        let bus = MockBus::new();
        bus.add_pci_device("0000:c4:00.3", PCI_CLASS_XHCI, "enabled");
        let restore = MockRestore::default();

        let mut pre =
            Coordinator::new(&bus, StateStore::new(&config.state_dir), &restore, config.clone());
        pre.run_pre().await;

        std::fs::write(&config.boot_id_path, "boot-b\n").unwrap();
        bus.clear_writes();
        let store = StateStore::new(&config.state_dir);
        let mut post = Coordinator::new(&bus, store.clone(), &restore, config);
        let report = post.run_post().await;

        assert!(!report.reversed_store);
        assert!(bus.writes().is_empty());
        assert!(!store.exists());
        assert_eq!(restore.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_usb_reset_pauses_between_writes() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let bus = MockBus::new();
        bus.add_usb_device("3-1", KEYBOARD_USB_ID);
        let restore = MockRestore::default();

        let started = tokio::time::Instant::now();
        let mut post =
            Coordinator::new(&bus, StateStore::new(&config.state_dir), &restore, config.clone());
        let report = post.run_post().await;

        assert_eq!(report.usb_reset, 1);
        let expected = config.usb_reset_pause() + config.write_settle() + config.restore_settle();
        assert!(started.elapsed() >= expected);
        assert_eq!(bus.attr("bus/usb/devices/3-1/authorized").as_deref(), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_always_succeeds() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let bus = MockBus::new();
        let restore = MockRestore::returning(RestoreOutcome::Missing);

        let mut coordinator =
            Coordinator::new(&bus, StateStore::new(&config.state_dir), &restore, config);
        assert_eq!(
            coordinator.run(HookPhase::Pre, Some(SleepAction::Suspend)).await,
            ExitCode::SUCCESS
        );
        assert_eq!(coordinator.run(HookPhase::Post, None).await, ExitCode::SUCCESS);
    }
}
