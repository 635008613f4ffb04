use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

pub mod repack {
    use arkive_cnt::CntManager;
    use arkive_core::{editor::ArchiveEditor, repack::FileSource};
    use divan::Bencher;
    use std::io::Cursor;

    fn get_input() -> Vec<u8> {
        let mut editor = ArchiveEditor::create(CntManager);
        for i in 0..256 {
            let directory = format!("textures\\set{}", i % 8);
            editor.add_file(directory, format!("tex{i}.gf"), FileSource::Memory(vec![i as u8; 4096]));
        }

        let mut output = Cursor::new(Vec::new());
        editor.repack(&mut output).unwrap();
        output.into_inner()
    }

    #[divan::bench]
    fn open(bencher: Bencher) {
        bencher.with_inputs(get_input).bench_values(|data| {
            divan::black_box(ArchiveEditor::open(CntManager, Cursor::new(data)).unwrap());
        });
    }

    #[divan::bench(sample_count = 10)]
    fn repack_all(bencher: Bencher) {
        bencher
            .with_inputs(|| ArchiveEditor::open(CntManager, Cursor::new(get_input())).unwrap())
            .bench_values(|editor| {
                let mut output = Cursor::new(Vec::new());
                divan::black_box(editor.repack(&mut output).unwrap());
            });
    }
}
