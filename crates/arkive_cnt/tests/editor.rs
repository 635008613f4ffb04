use arkive_cnt::{error::Result, CntManager};
use arkive_core::{
    cancel::CancellationToken,
    editor::ArchiveEditor,
    error::Error,
    repack::FileSource,
    tree::ArchiveEntry,
};
use parking_lot::RwLock;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::{fs, io::Cursor, thread};
use tracing_test::traced_test;

type Editor = ArchiveEditor<CntManager, Cursor<Vec<u8>>>;

fn repack(editor: Editor) -> Result<Editor> {
    let mut output = Cursor::new(Vec::new());
    editor.repack(&mut output)?;
    output.set_position(0);
    ArchiveEditor::open(CntManager, output)
}

fn sample() -> Result<Editor> {
    let mut editor = ArchiveEditor::create(CntManager);
    editor.add_file("", "readme.txt", FileSource::Memory(b"root file".to_vec()));
    editor.add_file("world\\maps", "fix.gf", FileSource::Memory(vec![0xAB; 64]));
    editor.add_file("world", "sky.gf", FileSource::Memory(vec![0x01, 0x02, 0x03]));
    editor.add_file("world\\maps", "empty.bin", FileSource::Memory(Vec::new()));
    repack(editor)
}

#[traced_test]
#[test]
fn minimal_archive_round_trip() -> Result<()> {
    let mut editor = ArchiveEditor::create(CntManager);
    editor.add_file("", "a.txt", FileSource::Memory(b"hello".to_vec()));

    let reloaded = repack(editor)?;

    assert_eq!(reloaded.tree().len(), 1);
    let (directory, entry) = reloaded
        .tree()
        .files()
        .next()
        .ok_or(Error::CustomError("no files".into()))?;
    assert!(directory.is_root());
    assert_eq!(entry.name(), "a.txt");
    assert_eq!(reloaded.read_file("", "a.txt")?, b"hello".to_vec());
    Ok(())
}

#[traced_test]
#[test]
fn untouched_files_survive_repack() -> Result<()> {
    let original = sample()?;
    let expected = original
        .items()
        .iter()
        .map(|item| Ok((item.directory.clone(), item.name.clone(), original.read_file(&item.directory, &item.name)?)))
        .collect::<Result<Vec<_>>>()?;

    let reloaded = repack(original)?;
    let actual = reloaded
        .items()
        .iter()
        .map(|item| Ok((item.directory.clone(), item.name.clone(), reloaded.read_file(&item.directory, &item.name)?)))
        .collect::<Result<Vec<_>>>()?;

    assert_eq!(actual, expected);
    assert_eq!(
        reloaded.tree().directories().iter().map(|d| d.path.as_str()).collect::<Vec<_>>(),
        vec!["", "world\\maps", "world"]
    );
    Ok(())
}

#[traced_test]
#[test]
fn replace_and_remove_files() -> Result<()> {
    let mut editor = sample()?;
    editor.add_file("world", "sky.gf", FileSource::Memory(b"new sky".to_vec()));
    editor.remove_file("", "readme.txt")?;
    assert!(matches!(
        editor.remove_file("", "readme.txt"),
        Err(Error::FileNotFound(_))
    ));

    let reloaded = repack(editor)?;
    assert_eq!(reloaded.tree().len(), 3);
    assert!(reloaded.tree().root().files.is_empty());
    assert_eq!(reloaded.read_file("world", "sky.gf")?, b"new sky".to_vec());
    assert_eq!(reloaded.read_file("world\\maps", "fix.gf")?, vec![0xAB; 64]);
    Ok(())
}

#[traced_test]
#[test]
fn missing_import_is_skipped() -> Result<()> {
    let directory = tempfile::tempdir()?;
    let present = directory.path().join("present.txt");
    fs::write(&present, b"on disk")?;
    let missing = directory.path().join("missing.txt");

    let mut editor = sample()?;
    editor.add_file("", "present.txt", FileSource::Pending(present));
    editor.add_file("", "missing.txt", FileSource::Pending(missing.clone()));

    let mut output = Cursor::new(Vec::new());
    let summary = editor.repack(&mut output)?;
    assert_eq!(summary.files, 5);
    assert_eq!(summary.skipped, vec![missing]);
    assert_eq!(summary.bytes, output.get_ref().len() as u64);
    assert!(logs_contain("skipping file"));

    output.set_position(0);
    let reloaded = ArchiveEditor::open(CntManager, output)?;
    assert_eq!(reloaded.read_file("", "present.txt")?, b"on disk".to_vec());
    Ok(())
}

#[traced_test]
#[test]
fn extract_mirrors_directories() -> Result<()> {
    let editor = sample()?;
    let destination = tempfile::tempdir()?;

    let report = editor.extract_all(destination.path(), &CancellationToken::new())?;
    assert!(report.is_complete());
    assert_eq!(report.succeeded.len(), 4);

    let fix = destination.path().join("world").join("maps").join("fix.gf");
    assert_eq!(fs::read(fix)?, vec![0xAB; 64]);
    assert_eq!(fs::read(destination.path().join("readme.txt"))?, b"root file".to_vec());
    Ok(())
}

#[test]
fn extract_stops_when_cancelled() -> Result<()> {
    let editor = sample()?;
    let destination = tempfile::tempdir()?;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = editor.extract_all(destination.path(), &cancel)?;
    assert!(report.cancelled);
    assert!(report.succeeded.is_empty());
    Ok(())
}

#[test]
fn readers_share_the_editor_while_mutation_is_exclusive() -> Result<()> {
    let editor = RwLock::new(sample()?);

    thread::scope(|scope| {
        let readers = (0..4)
            .map(|_| {
                scope.spawn(|| -> Result<Vec<u8>> {
                    let editor = editor.read();
                    editor.read_file("world\\maps", "fix.gf")
                })
            })
            .collect::<Vec<_>>();

        for reader in readers {
            let content = reader
                .join()
                .map_err(|_| Error::CustomError("reader panicked".into()))??;
            assert_eq!(content, vec![0xAB; 64]);
        }
        Ok::<(), Error>(())
    })?;

    editor
        .write()
        .add_file("", "late.txt", FileSource::Memory(b"late".to_vec()));

    let reloaded = repack(editor.into_inner())?;
    assert_eq!(reloaded.read_file("", "late.txt")?, b"late".to_vec());
    Ok(())
}

fn directory_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("a".to_string()),
        Just("a\\b".to_string()),
        Just("c".to_string()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn repacked_content_is_identical(
        files in prop::collection::vec((directory_name(), prop::collection::vec(any::<u8>(), 0..128)), 0..12)
    ) {
        let mut editor = ArchiveEditor::create(CntManager);
        for (index, (directory, content)) in files.iter().enumerate() {
            editor.add_file(directory.clone(), format!("file{index}.bin"), FileSource::Memory(content.clone()));
        }

        let first = repack(editor).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let second = repack(first).map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(second.tree().len(), files.len());
        for (index, (directory, content)) in files.iter().enumerate() {
            let actual = second
                .read_file(directory, &format!("file{index}.bin"))
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(&actual, content);

            let entry = second
                .tree()
                .find(directory, &format!("file{index}.bin"))
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let data = second.tree().data_block();
            prop_assert!(entry.pointer() >= data.start);
            prop_assert!(entry.pointer() + entry.size() <= data.end);
        }
    }
}
