#![cfg(test)]
use pretty_assertions::assert_eq;

use super::*;
use crate::common::logging;
use crate::common::pcb_type::PcbType;
use crate::components::cartridge::CartridgeImage;
use crate::components::rpk::Rpk;
use crate::components::rpk::RpkSocket;

/// GROM port offsets after masking with 0x1FFF. Bits 2-9 select the slot of the multi
/// connector.
const GROM_READ_DATA: u16 = 0x1800;
const GROM_WRITE_ADDRESS: u16 = 0x1C02;

fn nvram_store() -> (tempfile::TempDir, NvramStore) {
    logging::test_init(false);
    let dir = tempfile::tempdir().unwrap();
    let store = NvramStore::new(dir.path(), "ti99_4a");
    (dir, store)
}

/// Cartridge image whose GROM bytes are `fill` and whose ROM bytes are `fill + 1`.
fn grom_rom_image(fill: u8) -> CartridgeImage {
    CartridgeImage::Rpk(Rpk::new(
        PcbType::Standard,
        [
            RpkSocket::new("grom_socket", vec![fill; 0x2000], None),
            RpkSocket::new("rom_socket", vec![fill + 1; 0x2000], None),
        ],
    ))
}

fn set_grom_address(bus: &mut impl CartridgeBus, slot: u16, address: u16) {
    bus.set_gromlines(GromLines::write_address(), true);
    bus.write(GROM_WRITE_ADDRESS + 4 * slot, (address >> 8) as u8);
    bus.write(GROM_WRITE_ADDRESS + 4 * slot, address as u8);
    bus.set_gromlines(GromLines::write_address(), false);
}

fn read_grom_data(bus: &mut impl CartridgeBus, slot: u16) -> Option<u8> {
    bus.set_gromlines(GromLines::read_data(), true);
    let value = bus.readz(GROM_READ_DATA + 4 * slot);
    bus.set_gromlines(GromLines::read_data(), false);
    value
}

fn write_grom_data(bus: &mut impl CartridgeBus, value: u8) {
    bus.set_gromlines(GromLines::write_data(), true);
    bus.write(0x1C00, value);
    bus.set_gromlines(GromLines::write_data(), false);
}

fn rom_read(bus: &mut impl CartridgeBus, offset: u16) -> Option<u8> {
    bus.romgq_line(true);
    let value = bus.readz(offset);
    bus.romgq_line(false);
    value
}

fn rom_write(bus: &mut impl CartridgeBus, offset: u16, value: u8) {
    bus.romgq_line(true);
    bus.write(offset, value);
    bus.romgq_line(false);
}

fn multi_with_slots(switch: u8, slots: &[usize]) -> (tempfile::TempDir, MultiConnector) {
    let (dir, nvram) = nvram_store();
    let mut multi = MultiConnector::new(switch);
    for &slot in slots {
        multi.cartridges_mut()[slot]
            .load(grom_rom_image(0x10 * (slot as u8 + 1)), &nvram)
            .unwrap();
    }
    (dir, multi)
}

fn gkracker() -> (tempfile::TempDir, NvramStore, GramKrackerConnector) {
    let (dir, nvram) = nvram_store();
    let connector = GramKrackerConnector::new(GkSwitches::default(), None, &nvram).unwrap();
    (dir, nvram, connector)
}

#[test]
fn test_single_passes_through() {
    let (_dir, nvram) = nvram_store();
    let mut single = SingleConnector::new();
    assert_eq!(rom_read(&mut single, 0x0000), None);
    single.cartridge_mut().load(grom_rom_image(0x40), &nvram).unwrap();
    assert_eq!(rom_read(&mut single, 0x0000), Some(0x41));
    set_grom_address(&mut single, 0, 0x6000);
    assert_eq!(read_grom_data(&mut single, 0), Some(0x40));
    single.gclock_in(true);
    assert!(single.is_grom_idle());
}

#[test]
fn test_single_reset_keeps_cartridge() {
    let (_dir, nvram) = nvram_store();
    let config = PortConfig::default();
    let mut connector = Connector::new(&config, &nvram).unwrap();
    connector.cartridges_mut()[0]
        .load(grom_rom_image(0x20), &nvram)
        .unwrap();
    connector.reset(&config);
    assert_eq!(connector.slot_count(), 1);
    assert_eq!(rom_read(&mut connector, 0x0000), Some(0x21));
}

#[test]
fn test_multi_selects_slot_from_grom_address() {
    let (_dir, mut multi) = multi_with_slots(0, &[0, 1]);
    set_grom_address(&mut multi, 1, 0x6000);
    assert_eq!(read_grom_data(&mut multi, 1), Some(0x20));
    assert_eq!(multi.active_slot(), 1);
    // ROM space follows the slot selected by the last GROM access.
    assert_eq!(rom_read(&mut multi, 0x0000), Some(0x21));
    assert_eq!(read_grom_data(&mut multi, 0), Some(0x10));
    assert_eq!(rom_read(&mut multi, 0x0000), Some(0x11));
}

#[test]
fn test_multi_fixed_slot_wins() {
    let (_dir, mut multi) = multi_with_slots(3, &[0, 2]);
    assert_eq!(multi.fixed_slot(), Some(2));
    set_grom_address(&mut multi, 0, 0x6000);
    assert_eq!(multi.active_slot(), 2);
    assert_eq!(read_grom_data(&mut multi, 0), Some(0x30));
    assert_eq!(rom_read(&mut multi, 0x0000), Some(0x31));
    assert_eq!(multi.active_slot(), 2);
}

#[test]
fn test_multi_broadcast_keeps_grom_counters_equal() {
    let (_dir, mut multi) = multi_with_slots(0, &[0, 1, 3]);
    set_grom_address(&mut multi, 0, 0x6000);
    for _ in 0..5 {
        read_grom_data(&mut multi, 0);
    }
    read_grom_data(&mut multi, 3);
    let addresses: Vec<u16> = multi
        .cartridges()
        .iter()
        .filter_map(|cartridge| cartridge.board())
        .map(|board| board.groms()[0].address())
        .collect();
    assert_eq!(addresses, vec![0x6007, 0x6007, 0x6007]);
}

#[test]
fn test_multi_empty_and_out_of_range_slots() {
    let (_dir, mut multi) = multi_with_slots(0, &[0]);
    // Slot 2 is empty: the read is still seen by slot 0, but nobody drives the bus.
    set_grom_address(&mut multi, 2, 0x6000);
    assert_eq!(read_grom_data(&mut multi, 2), None);
    assert_eq!(multi.cartridges()[0].board().unwrap().groms()[0].address(), 0x6002);

    // Slots beyond the fourth exist on the address bus only.
    read_grom_data(&mut multi, 9);
    assert_eq!(multi.active_slot(), 9);
    assert_eq!(rom_read(&mut multi, 0x0000), None);
    assert_eq!(multi.crureadz(0x0800), None);
    assert!(!multi.is_grom_idle());
}

#[test]
fn test_multi_cru_does_not_change_slot() {
    let (_dir, mut multi) = multi_with_slots(0, &[0, 1]);
    read_grom_data(&mut multi, 1);
    multi.cruwrite(0x0800, true);
    assert_eq!(multi.crureadz(0x0800), None);
    assert_eq!(multi.active_slot(), 1);
}

#[test]
fn test_multi_switch_and_reset() {
    let (_dir, mut multi) = multi_with_slots(0, &[0, 1]);
    multi.switch_changed(2);
    assert_eq!((multi.active_slot(), multi.fixed_slot()), (1, Some(1)));
    read_grom_data(&mut multi, 0);
    assert_eq!(multi.active_slot(), 1);

    multi.switch_changed(0);
    assert_eq!((multi.active_slot(), multi.fixed_slot()), (0, None));

    multi.reset(4);
    assert_eq!(
        multi.state(),
        MultiState {
            active_slot: 0,
            fixed_slot: Some(3),
            grom_selected: false,
        }
    );
}

#[test]
fn test_gkracker_default_nvram() {
    let ram = gkracker::default_nvram();
    assert_eq!(ram.len(), GK_RAM_SIZE);
    assert_eq!(&ram[0x6000..0x6008], &[0xAA, 0x01, 0x01, 0, 0, 0, 0x60, 0x20]);
    // First menu entry: next 0x6040, start 0x6100, then the name.
    assert_eq!(&ram[0x6020..0x6025], &[0x60, 0x40, 0x61, 0x00, 15]);
    assert_eq!(&ram[0x6025..0x6034], b"OPTION GRAMS OK");
    // Last entry ends the chain.
    assert_eq!(&ram[0x60E0..0x60E5], &[0x00, 0x00, 0x61, 0x00, 9]);
    assert_eq!(&ram[0x60E5..0x60EE], b"GROM 3 OK");
    assert_eq!(ram[0x6100], 0x0B);
}

#[test]
fn test_gkracker_switch_blocks_gram_write() {
    let (_dir, _nvram, mut gk) = gkracker();
    gk.set_switch(1, 0).unwrap();
    set_grom_address(&mut gk, 0, 0x6000);
    write_grom_data(&mut gk, 0x55);
    assert_eq!(gk.grom_address(), 0x6001);

    gk.set_switch(1, 1).unwrap();
    set_grom_address(&mut gk, 0, 0x6000);
    assert_eq!(read_grom_data(&mut gk, 0), Some(0xAA));

    set_grom_address(&mut gk, 0, 0x6000);
    write_grom_data(&mut gk, 0x55);
    set_grom_address(&mut gk, 0, 0x6000);
    assert_eq!(read_grom_data(&mut gk, 0), Some(0x55));
}

#[test]
fn test_gkracker_counter_wraps_at_16_bits() {
    let (_dir, _nvram, mut gk) = gkracker();
    set_grom_address(&mut gk, 0, 0xFFFF);
    assert_eq!(read_grom_data(&mut gk, 0), Some(0x00));
    assert_eq!(gk.grom_address(), 0x0000);
    // No wrap at the 8 KiB boundary.
    set_grom_address(&mut gk, 0, 0x7FFF);
    read_grom_data(&mut gk, 0);
    assert_eq!(gk.grom_address(), 0x8000);
}

#[test]
fn test_gkracker_console_grams_follow_switches() {
    let (_dir, _nvram, mut gk) = gkracker();
    // Op Sys and TI BASIC positions leave GROMs 0 to 2 to the console.
    set_grom_address(&mut gk, 0, 0x0000);
    assert_eq!(read_grom_data(&mut gk, 0), None);
    set_grom_address(&mut gk, 0, 0x4000);
    assert_eq!(read_grom_data(&mut gk, 0), None);
    // The loader shadows GROM 1.
    set_grom_address(&mut gk, 0, 0x2000);
    assert_eq!(read_grom_data(&mut gk, 0), Some(0x00));

    gk.set_switch(2, 0).unwrap();
    gk.set_switch(3, 0).unwrap();
    gk.set_switch(5, 1).unwrap();
    gk.set_switch(4, 0).unwrap();
    for address in [0x0010, 0x2010, 0x4010] {
        set_grom_address(&mut gk, 0, address);
        write_grom_data(&mut gk, 0x77);
        set_grom_address(&mut gk, 0, address);
        assert_eq!(read_grom_data(&mut gk, 0), Some(0x77));
    }
    assert_eq!(gk.ram()[0x2010], 0x77);

    // GRAM 0 is write protected in the W/P position.
    gk.set_switch(4, 1).unwrap();
    set_grom_address(&mut gk, 0, 0x0010);
    write_grom_data(&mut gk, 0x99);
    assert_eq!(gk.ram()[0x0010], 0x77);
}

#[test]
fn test_gkracker_rom_banks() {
    let (_dir, _nvram, mut gk) = gkracker();
    gk.set_switch(4, 0).unwrap();
    rom_write(&mut gk, 0x0100, 0x11);
    gk.set_switch(4, 2).unwrap();
    rom_write(&mut gk, 0x0100, 0x22);
    assert_eq!(gk.ram()[0x10100], 0x11);
    assert_eq!(gk.ram()[0x12100], 0x22);

    // W/P position: writes only select the page.
    gk.set_switch(4, 1).unwrap();
    rom_write(&mut gk, 0x0100, 0xFF);
    assert_eq!(gk.ram_page(), 0);
    assert_eq!(rom_read(&mut gk, 0x0100), Some(0x11));
    rom_write(&mut gk, 0x0002, 0xFF);
    assert_eq!(gk.ram_page(), 1);
    assert_eq!(rom_read(&mut gk, 0x0100), Some(0x22));

    gk.set_switch(1, 0).unwrap();
    assert_eq!(rom_read(&mut gk, 0x0100), None);
}

#[test]
fn test_gkracker_guest_overrides_reads() {
    let (_dir, nvram, mut gk) = gkracker();
    gk.guest_mut().load(grom_rom_image(0x60), &nvram).unwrap();
    assert_eq!(rom_read(&mut gk, 0x0000), Some(0x61));
    set_grom_address(&mut gk, 0, 0x6000);
    assert_eq!(read_grom_data(&mut gk, 0), Some(0x60));
    // The GRAM Kracker counter followed the guest read.
    assert_eq!(gk.grom_address(), 0x6001);
}

#[test]
fn test_gkracker_switch_validation() {
    let (_dir, _nvram, mut gk) = gkracker();
    assert!(gk.set_switch(4, 2).is_ok());
    assert!(gk.set_switch(1, 2).is_err());
    assert!(gk.set_switch(6, 0).is_err());
    assert_eq!(gk.switches().position(4), Some(2));
    assert_eq!(gk.switches().position(0), None);
    gk.reset(GkSwitches::default());
    assert_eq!(gk.switches(), GkSwitches::default());
    assert_eq!(gk.grom_address(), 0);
}

#[test]
fn test_gkracker_nvram_round_trip() {
    let (_dir, nvram, mut gk) = gkracker();
    set_grom_address(&mut gk, 0, 0x8000);
    write_grom_data(&mut gk, 0x42);
    gk.save_nvram(&nvram).unwrap();

    let gk = GramKrackerConnector::new(GkSwitches::default(), None, &nvram).unwrap();
    assert_eq!(gk.ram()[0x8000], 0x42);
    assert_eq!(gk.ram()[0x6000], 0xAA);
}

#[test]
fn test_gkracker_loader_rom() {
    let (dir, nvram) = nvram_store();
    let path = dir.path().join("gkracker.bin");
    std::fs::write(&path, [0x12, 0x34]).unwrap();
    let mut gk = GramKrackerConnector::new(GkSwitches::default(), Some(&path), &nvram).unwrap();
    set_grom_address(&mut gk, 0, 0x2001);
    assert_eq!(read_grom_data(&mut gk, 0), Some(0x34));
    assert_eq!(read_grom_data(&mut gk, 0), Some(0x00));

    let missing = dir.path().join("missing.bin");
    assert!(GramKrackerConnector::new(GkSwitches::default(), Some(&missing), &nvram).is_ok());
}

#[test]
fn test_connector_state_requires_same_population() {
    let (_dir, nvram) = nvram_store();
    let config = PortConfig {
        connector: ConnectorKind::Multi,
        ..Default::default()
    };
    let mut connector = Connector::new(&config, &nvram).unwrap();
    connector.cartridge_mut(1).unwrap().load(grom_rom_image(0x10), &nvram).unwrap();
    set_grom_address(&mut connector, 1, 0x6000);
    let state = connector.save_state();

    read_grom_data(&mut connector, 1);
    read_grom_data(&mut connector, 1);
    connector.load_state(state.clone()).unwrap();
    let grom_address = |connector: &Connector| connector.cartridges()[1].board().unwrap().groms()[0].address();
    assert_eq!(grom_address(&connector), 0x6001);
    assert_eq!(read_grom_data(&mut connector, 1), Some(0x10));
    assert_eq!(grom_address(&connector), 0x6002);

    connector.cartridge_mut(1).unwrap().unload(&nvram).unwrap();
    assert!(connector.load_state(state.clone()).is_err());

    let mut single = Connector::new(&PortConfig::default(), &nvram).unwrap();
    assert!(single.load_state(state).is_err());
}
