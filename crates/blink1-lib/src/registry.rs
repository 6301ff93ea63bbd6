//! Device registry: enumeration, slot table and open-handle cache.
//!
//! Enumeration builds up to [`MAX_DEVICES`] slots sorted by serial. Callers
//! open a slot by [`Selector`] and get back a [`DeviceHandle`]; the same
//! selector yields the same handle until it is closed. With `keep_warm`
//! set, `close` only marks the handle idle and [`DeviceRegistry::flush`]
//! reclaims it later.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;

use crate::blink1::Blink1;
use crate::device::{self, DeviceError, HardwareRevision, Transport};
use crate::error::Result;
use crate::led::parse_number;
use crate::protocol::*;

// ── Handles and selectors ──

/// Registry-issued token for an open device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceHandle(u32);

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a caller names a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Slot index into the sorted table.
    Index(usize),
    /// USB serial, matched case-insensitively.
    Serial(String),
    /// Platform HID path; may be outside the table.
    Path(String),
}

impl Selector {
    /// Numeric ids below [`MAX_DEVICES`] are slot indexes; larger ones are
    /// serial numbers written as hex (`0x2000ABCD` → `"2000ABCD"`).
    pub fn from_id(id: u64) -> Selector {
        if (id as usize) < MAX_DEVICES {
            Selector::Index(id as usize)
        } else {
            Selector::Serial(format!("{id:X}"))
        }
    }

    /// Parse one `--id` token.
    ///
    /// Eight hex digits are always a serial, so `"20000001"` is not read
    /// as the decimal number twenty million and one.
    pub fn parse(token: &str) -> Selector {
        let t = token.trim();
        if t.contains('/') || t.contains('\\') || t.contains("://") {
            return Selector::Path(t.to_string());
        }
        if t.len() == EEPROM_SERIAL_LEN * 2 && t.chars().all(|c| c.is_ascii_hexdigit()) {
            return Selector::Serial(t.to_ascii_uppercase());
        }
        match parse_number(t) {
            Some(n) if n >= 0 => Selector::from_id(n as u64),
            _ => Selector::Serial(t.to_string()),
        }
    }
}

impl Default for Selector {
    fn default() -> Self {
        Selector::Index(0)
    }
}

impl FromStr for Selector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Selector::parse(s))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(i) => write!(f, "{i}"),
            Selector::Serial(s) => write!(f, "{s}"),
            Selector::Path(p) => write!(f, "{p}"),
        }
    }
}

/// The `--id` option: `all`, or a list of selectors separated by commas
/// and/or spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceList {
    All,
    Some(Vec<Selector>),
}

impl DeviceList {
    pub fn parse(s: &str) -> DeviceList {
        if s.trim().eq_ignore_ascii_case("all") {
            return DeviceList::All;
        }
        DeviceList::Some(
            s.split([',', ' '])
                .filter(|t| !t.is_empty())
                .map(Selector::parse)
                .collect(),
        )
    }

    /// Concrete selectors, expanding `all` over `count` enumerated slots.
    pub fn selectors(&self, count: usize) -> Vec<Selector> {
        match self {
            DeviceList::All => (0..count).map(Selector::Index).collect(),
            DeviceList::Some(v) if v.is_empty() => vec![Selector::default()],
            DeviceList::Some(v) => v.clone(),
        }
    }
}

impl Default for DeviceList {
    fn default() -> Self {
        DeviceList::Some(vec![Selector::default()])
    }
}

impl FromStr for DeviceList {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(DeviceList::parse(s))
    }
}

// ── Registry ──

/// Cached identity of one enumerated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceEntry {
    pub index: usize,
    pub serial: String,
    pub path: String,
    pub revision: HardwareRevision,
}

struct Slot<H> {
    entry: DeviceEntry,
    open: Option<(DeviceHandle, H)>,
    last_used: Instant,
}

/// A device opened by path that has no slot in the table.
struct Detached<H> {
    id: DeviceHandle,
    path: String,
    revision: HardwareRevision,
    raw: H,
}

pub struct DeviceRegistry<T: Transport> {
    transport: T,
    vendor_id: u16,
    product_id: u16,
    slots: Vec<Slot<T::Handle>>,
    enumerated: bool,
    detached: Vec<Detached<T::Handle>>,
    next_handle: u32,
    degamma: bool,
    keep_warm: bool,
}

impl<T: Transport> DeviceRegistry<T> {
    pub fn new(transport: T) -> Self {
        DeviceRegistry {
            transport,
            vendor_id: BLINK1_VID,
            product_id: BLINK1_PID,
            slots: Vec::new(),
            enumerated: false,
            detached: Vec::new(),
            next_handle: 1,
            degamma: true,
            keep_warm: false,
        }
    }

    /// Match another vendor/product pair (`pid` 0 = any product).
    pub fn with_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self.product_id = product_id;
        self
    }

    pub fn set_degamma(&mut self, on: bool) {
        self.degamma = on;
    }

    pub fn degamma(&self) -> bool {
        self.degamma
    }

    /// Keep handles open after `close` until [`flush`](Self::flush).
    pub fn set_keep_warm(&mut self, on: bool) {
        self.keep_warm = on;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ── Enumeration ──

    /// Rebuild the slot table from the transport. Returns the device count.
    ///
    /// Open handles follow their device (same serial and path) into the new
    /// table, so handle values stay valid; handles of devices that are gone
    /// are closed.
    pub fn enumerate(&mut self) -> Result<usize> {
        let found = match self.transport.enumerate(self.vendor_id, self.product_id) {
            Ok(found) => found,
            Err(e) => {
                self.close_slots();
                return Err(e.into());
            }
        };
        let mut entries: Vec<DeviceEntry> = Vec::new();
        for d in found {
            if d.serial.is_empty() {
                warn!("skipping {}: no serial number", d.path);
                continue;
            }
            if entries
                .iter()
                .any(|e| e.serial.eq_ignore_ascii_case(&d.serial))
            {
                debug!("skipping {}: duplicate serial {}", d.path, d.serial);
                continue;
            }
            if entries.len() == MAX_DEVICES {
                warn!("more than {MAX_DEVICES} devices; ignoring {}", d.serial);
                continue;
            }
            entries.push(DeviceEntry {
                index: 0,
                revision: HardwareRevision::from_serial(&d.serial),
                serial: d.serial,
                path: d.path,
            });
        }
        entries.sort_by(|a, b| a.serial.cmp(&b.serial));
        let now = Instant::now();
        let mut old = std::mem::take(&mut self.slots);
        self.slots = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let carried = old
                    .iter_mut()
                    .find(|s| {
                        s.open.is_some()
                            && s.entry.serial == entry.serial
                            && s.entry.path == entry.path
                    })
                    .map(|s| (s.open.take(), s.last_used));
                let (open, last_used) = carried.unwrap_or((None, now));
                Slot {
                    entry: DeviceEntry { index, ..entry },
                    open,
                    last_used,
                }
            })
            .collect();
        for slot in old {
            if let Some((id, raw)) = slot.open {
                debug!("closing {id}: {} is gone", slot.entry.serial);
                self.transport.close(raw);
            }
        }
        self.enumerated = true;
        debug!("enumerated {} device(s)", self.slots.len());
        Ok(self.slots.len())
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn entries(&self) -> Vec<DeviceEntry> {
        self.slots.iter().map(|s| s.entry.clone()).collect()
    }

    pub fn entry(&self, index: usize) -> Option<&DeviceEntry> {
        self.slots.get(index).map(|s| &s.entry)
    }

    /// Revision recorded for slot `index`; no transport traffic.
    pub fn device_type(&self, index: usize) -> HardwareRevision {
        self.entry(index).map(|e| e.revision).unwrap_or_default()
    }

    /// Whether slot `index` is an mk2 or later.
    pub fn is_revision2(&self, index: usize) -> bool {
        self.device_type(index).is_revision2_or_later()
    }

    fn find_slot(&self, selector: &Selector) -> Option<usize> {
        match selector {
            Selector::Index(i) => (*i < self.slots.len()).then_some(*i),
            Selector::Serial(s) => self
                .slots
                .iter()
                .position(|slot| slot.entry.serial.eq_ignore_ascii_case(s)),
            Selector::Path(p) => self.slots.iter().position(|slot| &slot.entry.path == p),
        }
    }

    // ── Open / close ──

    /// Open the selected device, or return its existing handle.
    ///
    /// Enumerates on first use. A serial or index that misses the table
    /// triggers one re-enumeration to pick up hot-plugged devices.
    pub fn open(&mut self, selector: &Selector) -> Result<DeviceHandle> {
        if !self.enumerated {
            self.enumerate()?;
        }
        let mut slot = self.find_slot(selector);
        if slot.is_none() && !matches!(selector, Selector::Path(_)) {
            debug!("{selector} not in table, re-enumerating");
            self.enumerate()?;
            slot = self.find_slot(selector);
        }
        match (slot, selector) {
            (Some(i), _) => self.open_slot(i),
            (None, Selector::Path(p)) => self.open_detached(p),
            (None, _) => Err(DeviceError::NotFound.into()),
        }
    }

    fn issue_handle(&mut self) -> DeviceHandle {
        let id = DeviceHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        id
    }

    fn open_slot(&mut self, i: usize) -> Result<DeviceHandle> {
        if let Some((id, _)) = &self.slots[i].open {
            let id = *id;
            self.slots[i].last_used = Instant::now();
            return Ok(id);
        }
        let raw = self.transport.open(&self.slots[i].entry.path)?;
        let id = self.issue_handle();
        let slot = &mut self.slots[i];
        info!("opened {} ({}) as {id}", slot.entry.serial, slot.entry.revision);
        slot.open = Some((id, raw));
        slot.last_used = Instant::now();
        Ok(id)
    }

    fn open_detached(&mut self, path: &str) -> Result<DeviceHandle> {
        let raw = self.transport.open(path)?;
        let id = self.issue_handle();
        self.detached.push(Detached {
            id,
            path: path.to_string(),
            revision: HardwareRevision::Unknown,
            raw,
        });
        Ok(id)
    }

    /// Release a handle. Slot handles stay open while `keep_warm` is set;
    /// handles the registry never issued are ignored.
    pub fn close(&mut self, handle: DeviceHandle) {
        let keep_warm = self.keep_warm;
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| matches!(&s.open, Some((id, _)) if *id == handle))
        {
            slot.last_used = Instant::now();
            if keep_warm {
                return;
            }
            if let Some((_, raw)) = slot.open.take() {
                self.transport.close(raw);
            }
            return;
        }
        if let Some(pos) = self.detached.iter().position(|d| d.id == handle) {
            let d = self.detached.remove(pos);
            self.transport.close(d.raw);
        }
    }

    /// Close every slot handle idle for at least `idle`. Returns how many
    /// were closed.
    pub fn flush(&mut self, idle: Duration) -> usize {
        let mut closed = 0;
        for slot in &mut self.slots {
            if slot.last_used.elapsed() < idle {
                continue;
            }
            if let Some((id, raw)) = slot.open.take() {
                debug!("closing idle {} ({id})", slot.entry.serial);
                self.transport.close(raw);
                closed += 1;
            }
        }
        closed
    }

    fn close_slots(&mut self) {
        for slot in &mut self.slots {
            if let Some((_, raw)) = slot.open.take() {
                self.transport.close(raw);
            }
        }
    }

    pub fn close_all(&mut self) {
        self.close_slots();
        for d in self.detached.drain(..) {
            self.transport.close(d.raw);
        }
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.open.is_some()).count() + self.detached.len()
    }

    // ── Sessions ──

    /// Borrow the device behind `handle` for a sequence of operations.
    pub fn session(&mut self, handle: DeviceHandle) -> device::Result<Blink1<'_, T>> {
        let now = Instant::now();
        for slot in &mut self.slots {
            if matches!(&slot.open, Some((id, _)) if *id == handle) {
                slot.last_used = now;
            }
        }
        let degamma = self.degamma;
        for slot in &self.slots {
            match &slot.open {
                Some((id, raw)) if *id == handle => {
                    return Ok(Blink1::new(
                        &self.transport,
                        raw,
                        &slot.entry.serial,
                        slot.entry.revision,
                        degamma,
                    ));
                }
                _ => {}
            }
        }
        self.detached
            .iter()
            .find(|d| d.id == handle)
            .map(|d| Blink1::new(&self.transport, &d.raw, &d.path, d.revision, degamma))
            .ok_or(DeviceError::UnknownHandle)
    }

    /// Open `selector`, run `f`, and close again whatever `f` returns.
    pub fn with_device<R>(
        &mut self,
        selector: &Selector,
        f: impl FnOnce(&Blink1<'_, T>) -> Result<R>,
    ) -> Result<R> {
        let handle = self.open(selector)?;
        let result = match self.session(handle) {
            Ok(dev) => f(&dev),
            Err(e) => Err(e.into()),
        };
        self.close(handle);
        result
    }
}

impl<T: Transport> Drop for DeviceRegistry<T> {
    fn drop(&mut self) {
        self.close_all();
    }
}
