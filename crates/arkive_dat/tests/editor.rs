use arkive_core::{editor::ArchiveEditor, error::Error, repack::FileSource};
use arkive_dat::{error::Result, DatManager};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::io::Cursor;
use tracing_test::traced_test;

type Editor = ArchiveEditor<DatManager, Cursor<Vec<u8>>>;

fn repack(editor: Editor) -> Result<Editor> {
    let mut output = Cursor::new(Vec::new());
    editor.repack(&mut output)?;
    output.set_position(0);
    ArchiveEditor::open(DatManager, output)
}

#[traced_test]
#[test]
fn replace_and_remove() -> Result<()> {
    let mut editor = ArchiveEditor::create(DatManager);
    editor.add_file("", "title.gf", FileSource::Memory(vec![0x10; 32]));
    editor.add_file("", "font.gf", FileSource::Memory(vec![0x20; 16]));
    editor.add_file("", "menu.gf", FileSource::Memory(vec![0x30; 8]));

    let mut editor = repack(editor)?;
    editor.add_file("", "font.gf", FileSource::Memory(b"new font".to_vec()));
    editor.remove_file("", "menu.gf")?;
    assert!(matches!(editor.remove_file("", "menu.gf"), Err(Error::FileNotFound(_))));

    let reloaded = repack(editor)?;
    let names = reloaded.items().iter().map(|item| item.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["title.gf", "font.gf"]);
    assert_eq!(reloaded.read_file("", "title.gf")?, vec![0x10; 32]);
    assert_eq!(reloaded.read_file("", "font.gf")?, b"new font".to_vec());
    Ok(())
}

#[traced_test]
#[test]
fn empty_archive_is_just_a_header() -> Result<()> {
    let editor = ArchiveEditor::create(DatManager);
    let mut output = Cursor::new(Vec::new());
    let summary = editor.repack(&mut output)?;

    assert_eq!(summary.files, 0);
    assert_eq!(output.into_inner(), vec![0x00, 0x00, 0x00, 0x00, 0x00]);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn repacked_content_is_identical(files in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..256), 0..12)) {
        let mut editor = ArchiveEditor::create(DatManager);
        for (index, content) in files.iter().enumerate() {
            editor.add_file("", format!("f{index}.bin"), FileSource::Memory(content.clone()));
        }

        let reloaded = repack(editor).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(reloaded.tree().len(), files.len());
        for (index, content) in files.iter().enumerate() {
            let actual = reloaded
                .read_file("", &format!("f{index}.bin"))
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(&actual, content);
        }
    }
}
