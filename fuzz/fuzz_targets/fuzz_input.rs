// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::sync::OnceLock;

use rambuid::db::Category;
use rambuid::storage::ImageStore;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    filename: &'a str,
    public_path: &'a str,
    kategori: &'a str,
}

fn store() -> &'static ImageStore {
    static STORE: OnceLock<ImageStore> = OnceLock::new();
    STORE.get_or_init(|| {
        let root = std::env::temp_dir().join("rambuid-fuzz-static");
        let exts: Vec<String> = ["jpg", "jpeg", "png", "gif", "webp"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        ImageStore::new(&root, &exts).expect("static dir")
    })
}

fuzz_target!(|input: Input<'_>| {
    let store = store();

    if let Ok(ext) = store.validate_extension(input.filename) {
        assert!(ext.starts_with('.'));
        assert_eq!(ext, ext.to_lowercase());
    }

    if let Some(path) = store.resolve(input.public_path) {
        assert!(path.starts_with(store.root()));
    }

    if let Ok(kategori) = input.kategori.parse::<Category>() {
        assert_eq!(kategori.as_str().parse::<Category>().ok(), Some(kategori));
    }
});
