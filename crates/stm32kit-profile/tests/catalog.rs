use std::path::PathBuf;

use stm32kit_profile::pin::{PinRole, SWCLK, SWDIO};
use stm32kit_profile::{Catalog, CoreVariant, ExceptionModel, PinClass, PinId, PinRequest};

fn shipped_catalog() -> Catalog {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
    Catalog::open(root).unwrap()
}

#[test]
fn shipped_declarations_all_resolve() {
    let catalog = shipped_catalog();
    let boards = catalog.boards().unwrap();
    assert!(boards.contains(&"nucleo_l552ze_q".to_string()));
    assert!(boards.contains(&"nucleo_f091rc".to_string()));
    for board in boards {
        let profile = catalog.resolve(&board, &PinRequest::populate_all()).unwrap();
        assert!(profile.pins().led().is_some(), "{board} has no LED");
        assert!(profile.unassigned_pins().is_empty());
    }
    for pack in catalog.packs().unwrap() {
        catalog.pack(&pack).unwrap();
    }
}

#[test]
fn nucleo_l552ze_q_default_profile() {
    let profile = shipped_catalog()
        .resolve("nucleo_l552ze_q", &PinRequest::default())
        .unwrap();
    assert_eq!(profile.core(), CoreVariant::CortexM33);
    assert_eq!(profile.exception_model(), ExceptionModel::Armv8mMainline);

    let led = profile.pins().led().unwrap();
    assert_eq!(led.name, "LD2");
    assert_eq!(led.role, PinRole::Led);
    assert!(!profile.pins().contains_pin(SWDIO));
    assert!(!profile.pins().contains_pin(SWCLK));
    assert_eq!(profile.classify(PinId::new('C', 14)), Some(PinClass::Reserved));
    assert!(profile.pins().by_name("LPUART1_TX").is_some());
}

#[test]
fn nucleo_f091rc_uses_board_port_list() {
    let profile = shipped_catalog()
        .resolve("nucleo_f091rc", &PinRequest::populate_all())
        .unwrap();
    assert_eq!(profile.ports(), ['A', 'B', 'C', 'D', 'F']);
    assert!(profile.pins().get(PinId::new('E', 0)).is_none());
    assert_eq!(profile.classify(PinId::new('E', 0)), None);
    assert_eq!(profile.exception_model(), ExceptionModel::Armv6m);
    assert_eq!(profile.probe.speed_khz, 1800);
}
