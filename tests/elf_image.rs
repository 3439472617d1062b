use gcstatics::dump::{read_region, read_regions, dump_object, SeriesLocation};
use gcstatics::emit::RelocKind;
use gcstatics::{build_image, parse_listing, EmitError, GcStaticDescKind};
use object::{elf, File, Object, ObjectSection, ObjectSymbol, RelocationFlags, SymbolKind};

const LISTING: &str = r#"
; two concrete types, one canonical form, one type nobody asks for
type App.Config     statics=RR.R threadstatics=.R
type App.Other      statics=.R
type List<__Canon>  statics=R.R
type Unused         statics=R

root App.Config
root App.Other
root App.Config threadstatic
root List<__Canon>
"#;

fn build(target: &str) -> Vec<u8> {
    let _ = env_logger::builder().is_test(true).try_init();
    let text = format!("target {target}\n{LISTING}");
    let listing = parse_listing(&text).unwrap();
    build_image(&listing).unwrap().bytes
}

fn relocated(kind: RelocKind, symbol: &str, addend: i64) -> SeriesLocation {
    SeriesLocation::Relocated { kind, symbol: symbol.to_string(), addend }
}

#[test]
fn sections_and_symbols() {
    let bytes = build("x86_64");
    let file = File::parse(&*bytes).unwrap();
    assert_eq!(file.architecture(), object::Architecture::X86_64);

    let rodata = file.section_by_name(".data.rel.ro").unwrap();
    let bss = file.section_by_name(".bss").unwrap();
    let tbss = file.section_by_name(".tbss").unwrap();
    assert_eq!(bss.size(), 32 + 16);
    assert_eq!(tbss.size(), 16);

    for name in [
        "__GCStaticDescRegion",
        "__CanonicalGCStaticDescRegion",
        "__ThreadStaticGCDescRegion",
        "__GCStaticDesc_App_Config",
        "__GCStaticDesc_App_Other",
        "__GCStaticDesc_List$3c__Canon$3e",
        "__ThreadStaticGCDesc_App_Config",
    ] {
        let sym = file.symbol_by_name(name).unwrap();
        assert_eq!(sym.section_index(), Some(rodata.index()), "{name}");
        assert_eq!(sym.kind(), SymbolKind::Data, "{name}");
    }

    let base = file.symbol_by_name("__GCSTATICBASE_App_Config").unwrap();
    assert_eq!(base.section_index(), Some(bss.index()));
    assert_eq!(base.size(), 32);
    let tls_base = file.symbol_by_name("__THREADSTATICBASE_App_Config").unwrap();
    assert_eq!(tls_base.section_index(), Some(tbss.index()));
    assert_eq!(tls_base.kind(), SymbolKind::Tls);

    // Never marked, so never emitted.
    assert!(file.symbol_by_name("__GCStaticDesc_Unused").is_none());
    assert!(file.symbol_by_name("__GCSTATICBASE_Unused").is_none());
    assert!(file.symbol_by_name("__CanonicalThreadStaticGCDescRegion").is_none());
    // Canonical forms have no storage of their own.
    assert!(file.symbol_by_name("__GCSTATICBASE_List$3c__Canon$3e").is_none());
}

#[test]
fn concrete_region_contents() {
    let bytes = build("x86_64");
    let region = read_region(&bytes, "__GCStaticDescRegion", None).unwrap();

    assert_eq!(region.kind, GcStaticDescKind::StaticConcrete);
    assert_eq!(region.size, 4 + 3 * 8);
    let series: Vec<_> = region
        .series
        .iter()
        .map(|s| (s.slot_count, s.location.clone()))
        .collect();
    // Members follow the order in which the roots were listed.
    assert_eq!(
        series,
        vec![
            (2, relocated(RelocKind::RelPtr32, "__GCSTATICBASE_App_Config", 0)),
            (1, relocated(RelocKind::RelPtr32, "__GCSTATICBASE_App_Config", 24)),
            (1, relocated(RelocKind::RelPtr32, "__GCSTATICBASE_App_Other", 8)),
        ]
    );

    let members: Vec<_> = region
        .members
        .iter()
        .map(|m| (m.symbol.as_str(), m.offset, m.size))
        .collect();
    assert_eq!(
        members,
        vec![("__GCStaticDesc_App_Config", 4, 16), ("__GCStaticDesc_App_Other", 20, 8)]
    );
}

#[test]
fn relocation_types_x86_64() {
    let bytes = build("x86_64");
    let file = File::parse(&*bytes).unwrap();
    let rodata = file.section_by_name(".data.rel.ro").unwrap();

    let mut pc32 = 0;
    let mut dtpoff32 = 0;
    for (_, reloc) in rodata.relocations() {
        match reloc.flags() {
            RelocationFlags::Elf { r_type: elf::R_X86_64_PC32 } => pc32 += 1,
            RelocationFlags::Elf { r_type: elf::R_X86_64_DTPOFF32 } => dtpoff32 += 1,
            other => panic!("unexpected relocation {other:?}"),
        }
    }
    assert_eq!(pc32, 3);
    assert_eq!(dtpoff32, 1);

    let region = read_region(&bytes, "__ThreadStaticGCDescRegion", None).unwrap();
    assert_eq!(region.series.len(), 1);
    assert_eq!(
        region.series[0].location,
        relocated(RelocKind::TlsOffset32, "__THREADSTATICBASE_App_Config", 8)
    );
}

#[test]
fn canonical_region_has_placeholders() {
    let bytes = build("x86_64");
    let file = File::parse(&*bytes).unwrap();
    let sym = file.symbol_by_name("__CanonicalGCStaticDescRegion").unwrap();
    let section = file.section_by_index(sym.section_index().unwrap()).unwrap();
    let data = section.data_range(sym.address(), sym.size()).unwrap().unwrap();
    assert_eq!(
        data,
        &[2, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0][..]
    );

    let start = sym.address();
    assert!(section
        .relocations()
        .all(|(offset, _)| offset < start || offset >= start + sym.size()));

    let listing = parse_listing(&format!("target x86_64\n{LISTING}")).unwrap();
    let region =
        read_region(&bytes, "__CanonicalGCStaticDescRegion", Some(&listing.table)).unwrap();
    assert!(region.series.iter().all(|s| s.location == SeriesLocation::Canonical));
    assert_eq!(region.members[0].resolved, Some(vec![0, 16]));
}

#[test]
fn x86_implicit_addends() {
    let bytes = build("x86");
    let file = File::parse(&*bytes).unwrap();
    assert_eq!(file.architecture(), object::Architecture::I386);
    assert_eq!(file.section_by_name(".bss").unwrap().size(), 16 + 8);

    let rodata = file.section_by_name(".data.rel.ro").unwrap();
    for (_, reloc) in rodata.relocations() {
        assert!(reloc.has_implicit_addend());
        assert!(matches!(
            reloc.flags(),
            RelocationFlags::Elf { r_type: elf::R_386_PC32 | elf::R_386_TLS_LDO_32 }
        ));
    }

    let region = read_region(&bytes, "__GCStaticDescRegion", None).unwrap();
    let locations: Vec<_> = region.series.iter().map(|s| s.location.clone()).collect();
    assert_eq!(
        locations,
        vec![
            relocated(RelocKind::RelPtr32, "__GCSTATICBASE_App_Config", 0),
            relocated(RelocKind::RelPtr32, "__GCSTATICBASE_App_Config", 12),
            relocated(RelocKind::RelPtr32, "__GCSTATICBASE_App_Other", 4),
        ]
    );

    let region = read_region(&bytes, "__ThreadStaticGCDescRegion", None).unwrap();
    assert_eq!(
        region.series[0].location,
        relocated(RelocKind::TlsOffset32, "__THREADSTATICBASE_App_Config", 4)
    );
}

#[test]
fn empty_region_is_a_zero_header() {
    let _ = env_logger::builder().is_test(true).try_init();
    let listing = parse_listing(
        "type Cache<__Canon> threadstatics=..\n\
         root Cache<__Canon> threadstatic\n",
    )
    .unwrap();
    let image = build_image(&listing).unwrap();

    let region = read_region(&image.bytes, "__CanonicalThreadStaticGCDescRegion", None).unwrap();
    assert_eq!(region.size, 4);
    assert!(region.series.is_empty());
    assert_eq!(region.members.len(), 1);
    assert_eq!(region.members[0].symbol, "__ThreadStaticGCDesc_Cache$3c__Canon$3e");
    assert_eq!(region.members[0].size, 0);

    assert_eq!(image.stats.descriptors_registered, 1);
    assert_eq!(image.stats.series_emitted, 0);
}

#[test]
fn session_statistics() {
    let listing = parse_listing(&format!("target x86_64\n{LISTING}")).unwrap();
    let image = build_image(&listing).unwrap();
    assert_eq!(image.stats.descriptors_registered, 4);
    assert_eq!(image.stats.series_emitted, 6);
    let text = image.stats.to_string();
    assert!(text.contains("__GCStaticDescRegion: 28 bytes"));
    assert!(text.contains("__ThreadStaticGCDescRegion: 12 bytes"));
    assert!(!text.contains("__CanonicalThreadStaticGCDescRegion"));
}

#[test]
fn deterministic_output() {
    assert_eq!(build("x86_64"), build("x86_64"));
    assert_eq!(build("x86"), build("x86"));
}

#[test]
fn dump_listing() {
    let bytes = build("x86_64");
    let listing = parse_listing(&format!("target x86_64\n{LISTING}")).unwrap();
    let text = dump_object(&bytes, Some(&listing.table)).unwrap();

    assert!(text.contains("__GCStaticDescRegion: 3 series, 28 bytes"));
    assert!(text.contains("rel32 __GCSTATICBASE_App_Other+8"));
    assert!(text.contains("tlsoff32 __THREADSTATICBASE_App_Config+8"));
    assert!(text.contains("__GCStaticDesc_App_Config at +4, 16 bytes"));
    assert!(text.contains("resolves to base+[0, 16]"));
    assert_eq!(read_regions(&bytes, None).unwrap().len(), 3);
}

#[test]
fn missing_region() {
    let bytes = build("x86_64");
    assert!(matches!(
        read_region(&bytes, "__CanonicalThreadStaticGCDescRegion", None),
        Err(EmitError::SymbolNotFound { .. })
    ));
    assert!(matches!(
        read_region(&bytes, "__NotARegion", None),
        Err(EmitError::SymbolNotFound { .. })
    ));
}
