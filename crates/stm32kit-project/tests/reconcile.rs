use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use stm32kit_profile::{Catalog, MergedProfile, PinRequest};
use stm32kit_project::{
    Force, Origin, PreservePolicy, ProjectDescriptor, ProjectError, Reconciler,
};
use stm32kit_render::{BackendKind, RenderOptions};

const BOARD: &str = "nucleo_l552ze_q";

fn copy_dir(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), target).unwrap();
        }
    }
}

/// A private copy of the shipped catalog plus an empty project directory.
struct Fixture {
    _dir: tempfile::TempDir,
    catalog_root: PathBuf,
    project: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let shipped = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
        let catalog_root = dir.path().join("catalog");
        copy_dir(&shipped.join("packs"), &catalog_root.join("packs"));
        copy_dir(&shipped.join("boards"), &catalog_root.join("boards"));
        let project = dir.path().join("blinky");
        Self {
            _dir: dir,
            catalog_root,
            project,
        }
    }

    fn profile(&self, request: &PinRequest) -> MergedProfile {
        Catalog::open(&self.catalog_root)
            .unwrap()
            .resolve(BOARD, request)
            .unwrap()
    }

    fn reconciler(&self, policy: PreservePolicy) -> Reconciler {
        Reconciler::new(&self.project, policy)
    }

    fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.project.join(path)).unwrap()
    }
}

#[test]
fn create_writes_every_file_and_descriptor() {
    let fx = Fixture::new();
    let (descriptor, report) = fx
        .reconciler(PreservePolicy::All)
        .create(&fx.profile(&PinRequest::default()), &RenderOptions::default())
        .unwrap();
    assert_eq!(report.written.len(), 10);
    assert!(report.skipped.is_empty());
    assert!(fx.project.join("stm32kit.project.json").is_file());
    assert!(fx.project.join("cmake/toolchain-arm-none-eabi.cmake").is_file());
    assert_eq!(descriptor.board, BOARD);
    assert!(descriptor.files.values().all(|r| r.origin == Origin::Generated));
    assert_eq!(ProjectDescriptor::load(&fx.project).unwrap(), descriptor);
}

#[test]
fn create_refuses_existing_project() {
    let fx = Fixture::new();
    let reconciler = fx.reconciler(PreservePolicy::All);
    let profile = fx.profile(&PinRequest::default());
    reconciler.create(&profile, &RenderOptions::default()).unwrap();
    assert!(matches!(
        reconciler.create(&profile, &RenderOptions::default()),
        Err(ProjectError::AlreadyExists { .. })
    ));
}

#[test]
fn regenerating_unchanged_project_is_idempotent() {
    let fx = Fixture::new();
    let reconciler = fx.reconciler(PreservePolicy::All);
    let profile = fx.profile(&PinRequest::default());
    let (first, _) = reconciler.create(&profile, &RenderOptions::default()).unwrap();
    let (second, report) = reconciler
        .regenerate(&profile, &RenderOptions::default(), &Force::None)
        .unwrap();
    assert!(report.is_noop());
    assert_eq!(report.unchanged.len(), 10);
    assert_eq!(first.files, second.files);
}

#[test]
fn edited_file_becomes_user_owned_and_survives() {
    let fx = Fixture::new();
    let reconciler = fx.reconciler(PreservePolicy::All);
    let profile = fx.profile(&PinRequest::default());
    reconciler.create(&profile, &RenderOptions::default()).unwrap();

    let edited = "int main(void) { for (;;) {} }\n";
    std::fs::write(fx.project.join("main.c"), edited).unwrap();

    let opened = reconciler.open().unwrap();
    assert_eq!(opened.files["main.c"].origin, Origin::UserOwned);
    // The flip is persisted.
    let reloaded = ProjectDescriptor::load(&fx.project).unwrap();
    assert_eq!(reloaded.files["main.c"].origin, Origin::UserOwned);

    let repinned = fx.profile(&PinRequest::populate_all());
    let (descriptor, report) = reconciler
        .regenerate(&repinned, &RenderOptions::default(), &Force::None)
        .unwrap();
    assert_eq!(report.skipped, ["main.c"]);
    assert_eq!(fx.read("main.c"), edited);
    assert!(report.written.contains(&"app_pins.h".to_string()));
    assert!(fx.read("app_pins.h").contains("APP_PIN_PB0"));
    assert_eq!(descriptor.files["main.c"].origin, Origin::UserOwned);
    assert!(descriptor.pin_request.populate_all);
}

#[test]
fn forced_regeneration_resets_origin() {
    let fx = Fixture::new();
    let reconciler = fx.reconciler(PreservePolicy::All);
    let profile = fx.profile(&PinRequest::default());
    reconciler.create(&profile, &RenderOptions::default()).unwrap();
    let pristine = fx.read("hal.c");
    std::fs::write(fx.project.join("hal.c"), "/* mine */\n").unwrap();
    std::fs::write(fx.project.join("main.c"), "/* mine too */\n").unwrap();

    let force = Force::Paths(BTreeSet::from(["hal.c".to_string()]));
    let (descriptor, report) = reconciler
        .regenerate(&profile, &RenderOptions::default(), &force)
        .unwrap();
    assert_eq!(report.written, ["hal.c"]);
    assert_eq!(report.skipped, ["main.c"]);
    assert_eq!(fx.read("hal.c"), pristine);
    assert_eq!(descriptor.files["hal.c"].origin, Origin::Generated);
    assert_eq!(descriptor.files["main.c"].origin, Origin::UserOwned);

    let (descriptor, _) = reconciler
        .regenerate(&profile, &RenderOptions::default(), &Force::All)
        .unwrap();
    assert!(descriptor.files.values().all(|r| r.origin == Origin::Generated));
}

#[test]
fn forcing_unknown_path_writes_nothing() {
    let fx = Fixture::new();
    let reconciler = fx.reconciler(PreservePolicy::All);
    let profile = fx.profile(&PinRequest::default());
    reconciler.create(&profile, &RenderOptions::default()).unwrap();
    let force = Force::Paths(BTreeSet::from(["Makefile".to_string()]));
    assert!(matches!(
        reconciler.regenerate(&profile, &RenderOptions::default(), &force),
        Err(ProjectError::UnknownFile { .. })
    ));
}

#[test]
fn render_failure_leaves_disk_untouched() {
    let fx = Fixture::new();
    let reconciler = fx.reconciler(PreservePolicy::All);
    let profile = fx.profile(&PinRequest::default());
    reconciler.create(&profile, &RenderOptions::default()).unwrap();
    let before = std::fs::read(fx.project.join("stm32kit.project.json")).unwrap();
    let pins_before = fx.read("app_pins.h");
    // An edit that a successful regeneration would record as user-owned.
    std::fs::write(fx.project.join("main.c"), "int main(void) { return 0; }\n").unwrap();

    std::fs::remove_file(fx.catalog_root.join("packs/stm32l5/templates/linker.ld.tmpl")).unwrap();
    let repinned = fx.profile(&PinRequest::populate_all());
    assert!(matches!(
        reconciler.regenerate(&repinned, &RenderOptions::default(), &Force::All),
        Err(ProjectError::Render(_))
    ));
    assert_eq!(fx.read("app_pins.h"), pins_before);
    assert_eq!(
        std::fs::read(fx.project.join("stm32kit.project.json")).unwrap(),
        before
    );
}

#[test]
fn unreadable_file_aborts_before_any_write() {
    let fx = Fixture::new();
    let reconciler = fx.reconciler(PreservePolicy::All);
    reconciler
        .create(&fx.profile(&PinRequest::default()), &RenderOptions::default())
        .unwrap();
    let before = std::fs::read(fx.project.join("stm32kit.project.json")).unwrap();
    let pins_before = fx.read("app_pins.h");
    let linker = fx.read("linker.ld");

    std::fs::remove_file(fx.project.join("linker.ld")).unwrap();
    std::fs::create_dir(fx.project.join("linker.ld")).unwrap();
    let renamed = fx.profile(&PinRequest::default().with_led_alias("STATUS"));
    assert!(matches!(
        reconciler.regenerate(&renamed, &RenderOptions::default(), &Force::None),
        Err(ProjectError::Io { .. })
    ));
    assert_eq!(fx.read("app_pins.h"), pins_before);
    assert_eq!(
        std::fs::read(fx.project.join("stm32kit.project.json")).unwrap(),
        before
    );

    std::fs::remove_dir(fx.project.join("linker.ld")).unwrap();
    std::fs::write(fx.project.join("linker.ld"), linker).unwrap();
    let opened = reconciler.open().unwrap();
    assert_eq!(opened.files["app_pins.h"].origin, Origin::Generated);
    assert_eq!(opened.files["linker.ld"].origin, Origin::Generated);

    let (_, report) = reconciler
        .regenerate(&renamed, &RenderOptions::default(), &Force::None)
        .unwrap();
    assert!(report.skipped.is_empty());
    assert!(fx.read("app_pins.h").contains("STATUS"));
}

#[test]
fn missing_generated_file_is_recreated() {
    let fx = Fixture::new();
    let reconciler = fx.reconciler(PreservePolicy::All);
    let profile = fx.profile(&PinRequest::default());
    reconciler.create(&profile, &RenderOptions::default()).unwrap();
    std::fs::remove_file(fx.project.join("linker.ld")).unwrap();

    let opened = reconciler.open().unwrap();
    assert_eq!(opened.files["linker.ld"].origin, Origin::Generated);
    let (_, report) = reconciler
        .regenerate(&profile, &RenderOptions::default(), &Force::None)
        .unwrap();
    assert_eq!(report.written, ["linker.ld"]);
    assert!(fx.project.join("linker.ld").is_file());
}

#[test]
fn backend_switch_orphans_old_build_files() {
    let fx = Fixture::new();
    let reconciler = fx.reconciler(PreservePolicy::All);
    let profile = fx.profile(&PinRequest::default());
    reconciler.create(&profile, &RenderOptions::default()).unwrap();

    let make = RenderOptions {
        backend: BackendKind::Make,
        ..RenderOptions::default()
    };
    let (descriptor, report) = reconciler.regenerate(&profile, &make, &Force::None).unwrap();
    assert_eq!(
        report.orphaned,
        ["CMakeLists.txt", "cmake/toolchain-arm-none-eabi.cmake"]
    );
    assert!(fx.project.join("CMakeLists.txt").is_file());
    assert!(fx.project.join("Makefile").is_file());
    assert!(!descriptor.files.contains_key("CMakeLists.txt"));
    assert_eq!(descriptor.backend, BackendKind::Make);
}

#[test]
fn pre_existing_files_are_adopted_on_create() {
    let fx = Fixture::new();
    std::fs::create_dir_all(&fx.project).unwrap();
    std::fs::write(fx.project.join("main.c"), "/* existing application */\n").unwrap();
    let (descriptor, report) = fx
        .reconciler(PreservePolicy::All)
        .create(&fx.profile(&PinRequest::default()), &RenderOptions::default())
        .unwrap();
    assert_eq!(report.skipped, ["main.c"]);
    assert_eq!(fx.read("main.c"), "/* existing application */\n");
    assert_eq!(descriptor.files["main.c"].origin, Origin::UserOwned);
}

#[test]
fn sources_policy_overwrites_edited_build_files() {
    let fx = Fixture::new();
    let reconciler = fx.reconciler(PreservePolicy::Sources);
    let profile = fx.profile(&PinRequest::default());
    reconciler.create(&profile, &RenderOptions::default()).unwrap();
    let pristine = fx.read("linker.ld");
    std::fs::write(fx.project.join("linker.ld"), "/* tweaked */\n").unwrap();
    std::fs::write(fx.project.join("hal.c"), "/* tweaked */\n").unwrap();

    let (descriptor, report) = reconciler
        .regenerate(&profile, &RenderOptions::default(), &Force::None)
        .unwrap();
    assert_eq!(report.overwritten, ["linker.ld"]);
    assert_eq!(report.skipped, ["hal.c"]);
    assert_eq!(fx.read("linker.ld"), pristine);
    assert_eq!(descriptor.files["linker.ld"].origin, Origin::Generated);
}

#[test]
fn open_without_descriptor_is_not_generated() {
    let fx = Fixture::new();
    assert!(matches!(
        fx.reconciler(PreservePolicy::All).open(),
        Err(ProjectError::NotGenerated { .. })
    ));
}
