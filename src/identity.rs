//! One-time provisioned device identity.
//!
//! Every unit carries a 6 byte identifier in non-volatile memory. The region
//! is laid out as:
//!
//! ```text
//! offset 0      marker   0xFF = erased, 1 = provisioned
//! offset 1..7   device id
//! ```
//!
//! On first boot the marker reads as erased, so the compiled-in default id is
//! written and the marker set. Later boots only read the id back.

use core::fmt;

use crate::consts::{
    DEFAULT_DEVICE_ID, DEVICE_ID_LEN, NVM_DEVICE_ID_ADDR, NVM_MARKER_ADDR, NVM_MARKER_INITIALIZED,
    NVM_MARKER_VIRGIN,
};

/// Permanent identifier of one physical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub [u8; DEVICE_ID_LEN]);

impl DeviceId {
    /// The compiled-in identifier used to provision erased units.
    pub const DEFAULT: DeviceId = DeviceId(DEFAULT_DEVICE_ID);

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; DEVICE_ID_LEN] {
        &self.0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Space separated two digit groups, e.g. `19 11 03 18 12 00`.
impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02}", b)?;
        }
        Ok(())
    }
}

#[cfg(feature = "defmt-0-3")]
impl defmt::Format for DeviceId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=[u8]}", self.0.as_slice())
    }
}

/// Byte addressable non-volatile storage (EEPROM or an emulation of it).
pub trait IdentityStorage {
    /// Storage access error.
    type Error: fmt::Debug;

    /// Reads the byte at `addr`.
    fn read_byte(&mut self, addr: u16) -> Result<u8, Self::Error>;

    /// Writes `value` at `addr`.
    fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), Self::Error>;
}

/// Errors raised while reading or provisioning the identity region.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError<E: fmt::Debug> {
    /// The underlying storage failed.
    #[error("identity storage access failed: {0:?}")]
    Storage(E),
}

/// Returns `true` if the identity region has been provisioned.
///
/// Only an erased marker means unprovisioned. Any other value is taken as
/// provisioned so a unit with a stray marker byte still boots with its stored id.
pub fn is_provisioned<S: IdentityStorage>(
    storage: &mut S,
) -> Result<bool, IdentityError<S::Error>> {
    match storage
        .read_byte(NVM_MARKER_ADDR)
        .map_err(IdentityError::Storage)?
    {
        NVM_MARKER_VIRGIN => Ok(false),
        NVM_MARKER_INITIALIZED => Ok(true),
        other => {
            warn!("unexpected identity marker {}, using stored id", other);
            Ok(true)
        }
    }
}

/// Writes `id` into the identity region and marks it provisioned.
///
/// The id is written before the marker, so an interrupted write leaves the
/// region erased and it is provisioned again on the next boot.
pub fn provision<S: IdentityStorage>(
    storage: &mut S,
    id: &DeviceId,
) -> Result<(), IdentityError<S::Error>> {
    for (offset, &b) in (0u16..).zip(id.0.iter()) {
        storage
            .write_byte(NVM_DEVICE_ID_ADDR + offset, b)
            .map_err(IdentityError::Storage)?;
    }
    storage
        .write_byte(NVM_MARKER_ADDR, NVM_MARKER_INITIALIZED)
        .map_err(IdentityError::Storage)
}

/// Reads the device id from the identity region.
pub fn read_device_id<S: IdentityStorage>(
    storage: &mut S,
) -> Result<DeviceId, IdentityError<S::Error>> {
    let mut id = [0u8; DEVICE_ID_LEN];
    for (offset, slot) in (0u16..).zip(id.iter_mut()) {
        *slot = storage
            .read_byte(NVM_DEVICE_ID_ADDR + offset)
            .map_err(IdentityError::Storage)?;
    }
    Ok(DeviceId(id))
}

/// Provisions the region with `default` on first boot, then returns the
/// stored device id.
pub fn load_or_provision<S: IdentityStorage>(
    storage: &mut S,
    default: &DeviceId,
) -> Result<DeviceId, IdentityError<S::Error>> {
    if !is_provisioned(storage)? {
        info!("identity region erased, provisioning default device id");
        provision(storage, default)?;
    }
    let id = read_device_id(storage)?;
    debug!("device id: {:?}", id.0);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockEeprom {
        cells: [u8; 7],
        writes: usize,
        fail_reads: bool,
    }

    impl MockEeprom {
        fn erased() -> Self {
            Self {
                cells: [0xff; 7],
                writes: 0,
                fail_reads: false,
            }
        }
    }

    #[derive(Debug, PartialEq)]
    struct OutOfRange(u16);

    impl IdentityStorage for MockEeprom {
        type Error = OutOfRange;

        fn read_byte(&mut self, addr: u16) -> Result<u8, Self::Error> {
            if self.fail_reads {
                return Err(OutOfRange(addr));
            }
            self.cells
                .get(addr as usize)
                .copied()
                .ok_or(OutOfRange(addr))
        }

        fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), Self::Error> {
            let cell = self.cells.get_mut(addr as usize).ok_or(OutOfRange(addr))?;
            *cell = value;
            self.writes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_first_boot_provisions_default() {
        let mut eeprom = MockEeprom::erased();
        let id = load_or_provision(&mut eeprom, &DeviceId::DEFAULT).unwrap();

        assert_eq!(id, DeviceId([19, 11, 3, 18, 12, 0]));
        assert_eq!(eeprom.cells, [1, 19, 11, 3, 18, 12, 0]);
        assert_eq!(eeprom.writes, 7);
    }

    #[test]
    fn test_later_boot_keeps_stored_id() {
        let mut eeprom = MockEeprom::erased();
        eeprom.cells = [1, 1, 2, 3, 4, 5, 6];

        let id = load_or_provision(&mut eeprom, &DeviceId::DEFAULT).unwrap();

        assert_eq!(id, DeviceId([1, 2, 3, 4, 5, 6]));
        assert_eq!(eeprom.writes, 0);
    }

    #[test]
    fn test_stray_marker_counts_as_provisioned() {
        for marker in [0x00, 0x5a] {
            let mut eeprom = MockEeprom::erased();
            eeprom.cells = [marker, 1, 2, 3, 4, 5, 6];

            assert!(is_provisioned(&mut eeprom).unwrap());
            let id = load_or_provision(&mut eeprom, &DeviceId::DEFAULT).unwrap();

            assert_eq!(id, DeviceId([1, 2, 3, 4, 5, 6]));
            assert_eq!(eeprom.cells[0], marker);
            assert_eq!(eeprom.writes, 0);
        }
    }

    #[test]
    fn test_storage_error_message() {
        let mut eeprom = MockEeprom::erased();
        eeprom.fail_reads = true;

        let err = is_provisioned(&mut eeprom).unwrap_err();
        assert_eq!(err.to_string(), "identity storage access failed: OutOfRange(0)");
    }

    #[test]
    fn test_storage_errors_propagate() {
        let mut eeprom = MockEeprom::erased();
        eeprom.fail_reads = true;

        let err = read_device_id(&mut eeprom).unwrap_err();
        assert!(matches!(err, IdentityError::Storage(OutOfRange(1))));
    }

    #[test]
    fn test_reprovision_overwrites_id() {
        let mut eeprom = MockEeprom::erased();
        provision(&mut eeprom, &DeviceId::DEFAULT).unwrap();
        provision(&mut eeprom, &DeviceId([9, 8, 7, 6, 5, 4])).unwrap();

        assert_eq!(
            read_device_id(&mut eeprom).unwrap(),
            DeviceId([9, 8, 7, 6, 5, 4])
        );
    }

    #[test]
    fn test_display_two_digit_groups() {
        assert_eq!(format!("{}", DeviceId::DEFAULT), "19 11 03 18 12 00");
    }
}
