use pretty_assertions::assert_eq;
use ti99_gromport::RpkBuilder;
use ti99_gromport::RpkError;
use ti99_gromport::RpkErrorKind;
use util::TestPort;

mod util;

fn load_error(test: &mut TestPort, rpk: &RpkBuilder) -> (RpkErrorKind, String) {
    let path = test.dir.path().join("broken.rpk");
    rpk.write_to(&path).unwrap();
    let error = test.port.load_rpk(0, &path).unwrap_err();
    let rpk_error = error.downcast_ref::<RpkError>().unwrap();
    (rpk_error.kind, rpk_error.to_string())
}

#[test]
pub fn test_missing_file() {
    let mut test = TestPort::new();
    let path = test.dir.path().join("missing.rpk");
    let error = test.port.load_rpk(0, &path).unwrap_err();
    assert_eq!(
        error.downcast_ref::<RpkError>().unwrap().kind,
        RpkErrorKind::NotArchiveFormat
    );
    assert!(format!("{:#}", error).contains("missing.rpk"));
}

#[test]
pub fn test_load_errors_are_reported() {
    let mut test = TestPort::new();
    let rom = [0u8; 0x2000];
    let cases = [
        (
            RpkBuilder::new("standard")
                .rom("r", "rom.bin", &rom)
                .socket("rom_socket", "r")
                .without_layout(),
            RpkErrorKind::MissingLayout,
        ),
        (
            RpkBuilder::new("standard")
                .rom("r", "rom.bin", &rom)
                .with_layout("<romset><resources>"),
            RpkErrorKind::XmlFormatError,
        ),
        (
            RpkBuilder::new("cartridge9000")
                .rom("r", "rom.bin", &rom)
                .socket("rom_socket", "r"),
            RpkErrorKind::UnknownPcbType,
        ),
        (
            RpkBuilder::new("standard")
                .rom("r", "rom.bin", &rom)
                .socket("rom_socket", "q"),
            RpkErrorKind::InvalidResourceReference,
        ),
        (
            RpkBuilder::new("standard")
                .rom("r", "rom.bin", &rom)
                .socket("rom_socket", "r")
                .with_layout(
                    "<romset><resources><rom id=\"r\" file=\"other.bin\"/></resources>\
                     <configuration><pcb type=\"standard\"><socket id=\"rom_socket\" \
                     uses=\"r\"/></pcb></configuration></romset>",
                ),
            RpkErrorKind::InvalidFileRef,
        ),
    ];
    for (rpk, expected_kind) in cases {
        let (kind, message) = load_error(&mut test, &rpk);
        assert_eq!(kind, expected_kind, "{}", message);
        assert!(!test.port.is_loaded(0));
    }
}

#[test]
pub fn test_error_message() {
    let mut test = TestPort::new();
    let rpk = RpkBuilder::new("standard")
        .rom("r", "rom.bin", &[0; 16])
        .socket("rom_socket", "nothing");
    assert_eq!(
        load_error(&mut test, &rpk).1,
        "Invalid resource reference: nothing"
    );
}
