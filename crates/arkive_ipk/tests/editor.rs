use arkive_core::{editor::ArchiveEditor, repack::FileSource};
use arkive_ipk::{error::Result, IpkManager, IpkOptions};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::io::Cursor;
use tracing_test::traced_test;

type Editor = ArchiveEditor<IpkManager, Cursor<Vec<u8>>>;

fn repack(editor: Editor) -> Result<Editor> {
    let manager = *editor.manager();
    let mut output = Cursor::new(Vec::new());
    editor.repack(&mut output)?;
    output.set_position(0);
    ArchiveEditor::open(manager, output)
}

#[traced_test]
#[test]
fn minimal_bundle_round_trip() -> Result<()> {
    let mut editor = ArchiveEditor::create(IpkManager::default());
    editor.add_file("", "a.txt", FileSource::Memory(b"hello".to_vec()));

    let reloaded = repack(editor)?;
    assert_eq!(reloaded.tree().len(), 1);
    assert_eq!(reloaded.read_file("", "a.txt")?, b"hello".to_vec());
    Ok(())
}

#[traced_test]
#[test]
fn compression_survives_a_second_repack() -> Result<()> {
    let manager = IpkManager::new(IpkOptions::builder().compress_new_files(true).build());
    let content = b"level data ".repeat(100);

    let mut editor = ArchiveEditor::create(manager);
    editor.add_file("world/1-1", "map.isc", FileSource::Memory(content.clone()));

    let first = repack(editor)?;
    let stored = first.tree().find("world/1-1", "map.isc")?.stored_size;

    let mut second = repack(first)?;
    let entry = second.tree().find("world/1-1", "map.isc")?;
    assert!(entry.compressed);
    assert_eq!(entry.stored_size, stored);
    assert_eq!(second.read_file("world/1-1", "map.isc")?, content);

    second.add_file("world/1-1", "map.isc", FileSource::Memory(b"tiny".to_vec()));
    let third = repack(second)?;
    assert_eq!(third.read_file("world/1-1", "map.isc")?, b"tiny".to_vec());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn repacked_content_is_identical(
        compress in any::<bool>(),
        files in prop::collection::vec(
            (prop_oneof![Just(""), Just("a"), Just("a/b")], prop::collection::vec(any::<u8>(), 0..256)),
            0..10,
        )
    ) {
        let manager = IpkManager::new(IpkOptions::builder().compress_new_files(compress).build());
        let mut editor = ArchiveEditor::create(manager);
        for (index, (directory, content)) in files.iter().enumerate() {
            editor.add_file(*directory, format!("file{index}.bin"), FileSource::Memory(content.clone()));
        }

        let reloaded = repack(editor).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(reloaded.tree().len(), files.len());
        for (index, (directory, content)) in files.iter().enumerate() {
            let actual = reloaded
                .read_file(directory, &format!("file{index}.bin"))
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(&actual, content);
        }
    }
}
