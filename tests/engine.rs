//! Engine behavior over the public API: model construction, visibility,
//! defaults, select/imply propagation, choice election, ranges, and
//! assignability.

use std::path::PathBuf;

use kconfig_eval::{Item, Model, SymbolId, SymbolKind, SymbolValue, Tristate};

const STORAGE_TREE: &str = r#"mainmenu "Storage Subsystem Configuration"

config MODULES
	bool "Enable module support"
	default y
	option modules

menu "Block layer"
	depends on !BROKEN

config BLK_DEV
	bool "Block device support"
	default y
	help
	  Core block layer. Needed by every disk-shaped driver in the
	  tree, and by anything that wants a request queue.

config BLK_TIMEOUT
	int "Request timeout in seconds"
	depends on BLK_DEV
	range 1 300
	default 30

menuconfig SCSI
	tristate "SCSI support"
	select BLK_DEV
	imply SCSI_PROC

config SCSI_PROC
	tristate "SCSI procfs reporting"
	depends on SCSI

endmenu
"#;

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("kconfig_eval_{}_{}", tag, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn load(tag: &str, kconfig: &str) -> Model {
    let dir = scratch_dir(tag);
    let path = dir.join("Kconfig");
    std::fs::write(&path, kconfig).expect("write Kconfig");
    Model::load(&path).expect("load model")
}

fn sym(model: &Model, name: &str) -> SymbolId {
    model
        .symbol(name)
        .unwrap_or_else(|| panic!("symbol {} missing", name))
}

fn tri(model: &Model, name: &str) -> Tristate {
    model.tristate_value(sym(model, name))
}

#[test]
fn model_indexes_symbols_and_references() {
    let model = load("storage_tree", STORAGE_TREE);

    for name in ["MODULES", "BLK_DEV", "BLK_TIMEOUT", "SCSI", "SCSI_PROC"] {
        let id = sym(&model, name);
        assert!(model.sym(id).is_defined(), "{} should be defined", name);
    }
    assert_eq!(model.mainmenu_text(), "Storage Subsystem Configuration");

    // BROKEN is referenced in the menu condition but never defined.
    let broken = sym(&model, "BROKEN");
    assert!(!model.sym(broken).is_defined());
    assert_eq!(model.sym(broken).kind(), SymbolKind::Unknown);

    let scsi = sym(&model, "SCSI");
    assert_eq!(model.sym(scsi).kind(), SymbolKind::Tristate);
    assert_eq!(model.sym(scsi).selects().len(), 1);
    assert_eq!(model.sym(scsi).implies().len(), 1);
    assert_eq!(model.prompt(scsi), Some("SCSI support"));

    // The menuconfig flag survives into the item tree.
    let flagged = model.iter_items().any(|n| {
        model.node(n).is_menuconfig()
            && matches!(model.node(n).item(), Item::Symbol(s) if s == scsi)
    });
    assert!(flagged, "SCSI node should be a menuconfig");
}

#[test]
fn help_bodies_are_dedented_and_bounded() {
    let mut model = load("help_bodies", STORAGE_TREE);

    let blk = sym(&model, "BLK_DEV");
    let help = model.sym(blk).help().expect("BLK_DEV has help");
    assert!(help.starts_with("Core block layer."), "got: {:?}", help);
    assert!(help.contains("request queue"));
    assert!(!help.contains('\t'));

    // The properties and entries after the help body still parse: the
    // select on SCSI works, so the body did not swallow them.
    assert!(model.symbol("BLK_TIMEOUT").is_some());
    let scsi = sym(&model, "SCSI");
    model.set_value(scsi, "y");
    assert_eq!(tri(&model, "BLK_DEV"), Tristate::Yes);
}

#[test]
fn choice_type_is_inferred_from_members() {
    let src = "choice\n\tprompt \"IO scheduler\"\n\nconfig IOSCHED_NOOP\n\tbool \"noop\"\n\nconfig IOSCHED_DEADLINE\n\tbool \"deadline\"\n\nendchoice\n";
    let model = load("choice_infer", src);

    let noop = sym(&model, "IOSCHED_NOOP");
    let deadline = sym(&model, "IOSCHED_DEADLINE");
    let choice = model
        .sym(noop)
        .choice()
        .expect("members belong to the choice");
    assert_eq!(model.sym(deadline).choice(), Some(choice));
    assert_eq!(model.choice(choice).members(), &[noop, deadline]);
    // The untyped choice takes its type from the first typed member.
    assert_eq!(model.choice(choice).kind(), SymbolKind::Bool);
}

#[test]
fn source_inlines_relative_paths_and_rejects_cycles() {
    let dir = scratch_dir("source_inline");
    std::fs::write(
        dir.join("Kconfig"),
        "config TOP\n\tbool \"top\"\n\nsource \"sub/Kconfig.sub\"\n",
    )
    .unwrap();
    std::fs::create_dir_all(dir.join("sub")).unwrap();
    std::fs::write(
        dir.join("sub/Kconfig.sub"),
        "config SUB\n\tbool \"sub\"\n\tdefault TOP\n",
    )
    .unwrap();

    let model = Model::load(dir.join("Kconfig")).expect("load");
    assert!(model.symbol("SUB").is_some());

    // A file that sources itself is rejected.
    std::fs::write(dir.join("loop.in"), "source \"loop.in\"\n").unwrap();
    let err = Model::load(dir.join("loop.in")).unwrap_err();
    assert!(err.to_string().contains("cycle"), "got: {}", err);
}

#[test]
fn conflicting_type_redeclaration_is_an_error() {
    let dir = scratch_dir("redecl");
    let path = dir.join("Kconfig");
    std::fs::write(
        &path,
        "config FOO\n\tbool \"foo\"\n\nconfig FOO\n\tint \"foo again\"\n",
    )
    .unwrap();
    let err = Model::load(&path).unwrap_err();
    assert!(
        err.to_string().contains("redeclared"),
        "unexpected error: {}",
        err
    );

    // Re-declaring with the same type is fine.
    std::fs::write(
        &path,
        "config FOO\n\tbool \"foo\"\n\nconfig FOO\n\tbool\n\tdefault y\n",
    )
    .unwrap();
    assert!(Model::load(&path).is_ok());
}

#[test]
fn depends_on_blocks_value_and_visibility() {
    let mut model = load(
        "depends_blocks",
        "config A\n\tbool \"A\"\n\nconfig B\n\tbool \"B\"\n\tdepends on A\n",
    );
    let a = sym(&model, "A");
    let b = sym(&model, "B");

    assert!(model.set_value(a, "y"));
    assert!(model.set_value(b, "y"));
    assert_eq!(tri(&model, "B"), Tristate::Yes);

    // Disabling A hides B and drops its value regardless of the stored
    // user value.
    assert!(model.set_value(a, "n"));
    assert_eq!(model.visibility(b), Tristate::No);
    assert_eq!(tri(&model, "B"), Tristate::No);
    assert!(model.assignable(b).is_empty());
}

#[test]
fn select_forces_promptless_target() {
    let mut model = load(
        "select_forces",
        "config A\n\tbool\n\nconfig B\n\tbool \"B\"\n\tselect A\n",
    );
    let a = sym(&model, "A");
    let b = sym(&model, "B");

    assert_eq!(tri(&model, "A"), Tristate::No);
    assert!(model.set_value(b, "y"));
    // A has no prompt, so it is invisible, but the reverse dependency
    // still forces its value.
    assert_eq!(model.visibility(a), Tristate::No);
    assert_eq!(tri(&model, "A"), Tristate::Yes);
}

#[test]
fn conditional_select_follows_condition() {
    let mut model = load(
        "cond_select",
        "config C\n\tbool \"C\"\n\nconfig A\n\tbool\n\nconfig B\n\tbool \"B\"\n\tselect A if C\n",
    );
    let b = sym(&model, "B");
    let c = sym(&model, "C");

    model.set_value(b, "y");
    assert_eq!(tri(&model, "A"), Tristate::No);
    model.set_value(c, "y");
    assert_eq!(tri(&model, "A"), Tristate::Yes);
}

#[test]
fn imply_is_weak() {
    let mut model = load(
        "imply_weak",
        "config A\n\tbool \"A\"\n\nconfig B\n\tbool \"B\"\n\timply A\n",
    );
    let a = sym(&model, "A");
    let b = sym(&model, "B");

    assert!(model.set_value(b, "y"));
    assert_eq!(tri(&model, "A"), Tristate::Yes);

    // An explicit n overrides the imply.
    assert!(model.set_value(a, "n"));
    assert_eq!(tri(&model, "A"), Tristate::No);
    // ... and value still tracks B once the explicit value is gone.
    model.unset_value(a);
    assert_eq!(tri(&model, "A"), Tristate::Yes);
}

#[test]
fn imply_does_not_override_applicable_default() {
    // The weak reverse dep only kicks in when the symbol would otherwise
    // be n.
    let mut model = load(
        "imply_default",
        "config A\n\tbool \"A\"\n\tdefault y\n\nconfig B\n\tbool \"B\"\n\timply A\n",
    );
    let b = sym(&model, "B");
    model.set_value(b, "y");
    assert_eq!(tri(&model, "A"), Tristate::Yes);
}

#[test]
fn defaults_apply_in_declared_order() {
    let mut model = load(
        "default_order",
        "config COND\n\tbool \"cond\"\n\nconfig V\n\tint \"v\"\n\tdefault 1 if COND\n\tdefault 2\n",
    );
    let v = sym(&model, "V");
    assert_eq!(model.string_value(v), "2");

    let cond = sym(&model, "COND");
    model.set_value(cond, "y");
    assert_eq!(model.string_value(v), "1");
}

#[test]
fn default_value_is_clamped_by_condition() {
    // `default m if COND` contributes min(m, cond), so a m-valued
    // condition caps a y default at m.
    let mut model = load(
        "default_min",
        "config MODULES\n\tbool \"modules\"\n\tdefault y\n\toption modules\n\nconfig DEP\n\ttristate \"dep\"\n\nconfig T\n\ttristate \"t\"\n\tdefault y if DEP\n",
    );
    let dep = sym(&model, "DEP");
    model.set_value(dep, "m");
    assert_eq!(tri(&model, "T"), Tristate::Mod);
}

#[test]
fn range_clamps_user_and_default_values() {
    let mut model = load(
        "range_clamp",
        "config N\n\tint \"n\"\n\trange 1 10\n\tdefault 5\n",
    );
    let n = sym(&model, "N");
    assert_eq!(model.string_value(n), "5");

    // In-range user values are kept verbatim and accepted.
    assert!(model.set_value(n, "7"));
    assert_eq!(model.string_value(n), "7");

    // Out-of-range user values are rejected but clamped to the nearest
    // bound for display.
    assert!(!model.set_value(n, "15"));
    assert_eq!(model.string_value(n), "10");
    assert!(!model.set_value(n, "0"));
    assert_eq!(model.string_value(n), "1");

    // Non-numeric input is ignored outright.
    assert!(!model.set_value(n, "banana"));
    assert_eq!(model.string_value(n), "1");
}

#[test]
fn hex_values_format_with_prefix() {
    let mut model = load(
        "hex_fmt",
        "config H\n\thex \"h\"\n\trange 0x10 0xff\n\tdefault 0x20\n",
    );
    let h = sym(&model, "H");
    assert_eq!(model.string_value(h), "0x20");

    assert!(model.set_value(h, "0xAB"));
    assert_eq!(model.string_value(h), "0xAB");

    assert!(!model.set_value(h, "0x500"));
    assert_eq!(model.string_value(h), "0xff");
}

#[test]
fn choice_elects_exactly_one_member() {
    let src = "choice\n\tprompt \"Compression\"\n\tdefault GZIP\n\nconfig NONE\n\tbool \"none\"\n\nconfig GZIP\n\tbool \"gzip\"\n\nconfig XZ\n\tbool \"xz\"\n\nendchoice\n";
    let mut model = load("choice_elect", src);
    let gzip = sym(&model, "GZIP");
    let xz = sym(&model, "XZ");

    // No user input: the default wins the election.
    assert_eq!(tri(&model, "GZIP"), Tristate::Yes);
    assert_eq!(tri(&model, "NONE"), Tristate::No);
    assert_eq!(tri(&model, "XZ"), Tristate::No);

    let choice = model.sym(gzip).choice().unwrap();
    assert_eq!(model.choice_mode(choice), Tristate::Yes);
    assert_eq!(model.choice_selection(choice), Some(gzip));

    // Electing another member flips exactly the two values involved.
    assert!(model.set_selection(choice, xz));
    assert_eq!(tri(&model, "XZ"), Tristate::Yes);
    assert_eq!(tri(&model, "GZIP"), Tristate::No);

    let members = model.choice(choice).members().to_vec();
    let y_count = members
        .iter()
        .filter(|&&m| model.tristate_value(m) == Tristate::Yes)
        .count();
    assert_eq!(y_count, 1);
}

#[test]
fn optional_choice_can_be_disabled() {
    let src = "choice\n\tprompt \"Maybe\"\n\toptional\n\nconfig OPT_A\n\tbool \"a\"\n\nconfig OPT_B\n\tbool \"b\"\n\nendchoice\n";
    let model = load("choice_optional", src);
    let a = sym(&model, "OPT_A");
    let choice = model.sym(a).choice().unwrap();

    // No user input and `optional`: the choice stays off.
    assert_eq!(model.choice_mode(choice), Tristate::No);
    assert_eq!(tri(&model, "OPT_A"), Tristate::No);
    assert_eq!(tri(&model, "OPT_B"), Tristate::No);
}

#[test]
fn tristate_choice_in_m_mode_caps_members() {
    let src = "config MODULES\n\tbool \"modules\"\n\tdefault y\n\toption modules\n\nchoice\n\tprompt \"Driver\"\n\ttristate \"drv\"\n\nconfig DRV_A\n\ttristate \"a\"\n\nconfig DRV_B\n\ttristate \"b\"\n\nendchoice\n";
    let mut model = load("choice_m_mode", src);
    let a = sym(&model, "DRV_A");
    let b = sym(&model, "DRV_B");
    let choice = model.sym(a).choice().unwrap();

    assert!(model.set_choice_mode(choice, Tristate::Mod));
    assert_eq!(model.choice_mode(choice), Tristate::Mod);

    // In m mode members resolve independently, capped at m.
    model.set_value(a, "m");
    model.set_value(b, "m");
    assert_eq!(tri(&model, "DRV_A"), Tristate::Mod);
    assert_eq!(tri(&model, "DRV_B"), Tristate::Mod);
    assert_eq!(model.choice_selection(choice), None);

    // Assigning y to a member snaps the whole choice into y mode.
    assert!(model.set_value(b, "y"));
    assert_eq!(model.choice_mode(choice), Tristate::Yes);
    assert_eq!(model.choice_selection(choice), Some(b));
    assert_eq!(tri(&model, "DRV_A"), Tristate::No);
    assert_eq!(tri(&model, "DRV_B"), Tristate::Yes);
}

#[test]
fn assignable_tracks_visibility_and_rev_deps() {
    let src = "config MODULES\n\tbool \"modules\"\n\tdefault y\n\toption modules\n\nconfig GATE\n\ttristate \"gate\"\n\nconfig T\n\ttristate \"t\"\n\tdepends on GATE\n\nconfig SEL\n\tbool \"sel\"\n\nconfig FORCED\n\ttristate \"forced\"\n\tselect SEL\n";
    let mut model = load("assignable", src);
    let gate = sym(&model, "GATE");
    let t = sym(&model, "T");
    let selector = sym(&model, "FORCED");
    let selected = sym(&model, "SEL");

    model.set_value(gate, "y");
    assert_eq!(
        model.assignable(t),
        vec![Tristate::No, Tristate::Mod, Tristate::Yes]
    );

    // A gate at m caps visibility at m.
    model.set_value(gate, "m");
    assert_eq!(model.assignable(t), vec![Tristate::No, Tristate::Mod]);

    // A y-valued selector pins the target to y.
    model.set_value(selector, "y");
    assert_eq!(model.assignable(selected), vec![Tristate::Yes]);
    assert_eq!(tri(&model, "SEL"), Tristate::Yes);

    // Bool symbols never offer m.
    model.set_value(selector, "n");
    assert_eq!(model.assignable(selected), vec![Tristate::No, Tristate::Yes]);
}

#[test]
fn value_stays_within_assignable_and_above_rev_dep() {
    let src = "config MODULES\n\tbool \"modules\"\n\tdefault y\n\toption modules\n\nconfig A\n\tbool \"a\"\n\tdefault y\n\nconfig B\n\ttristate \"b\"\n\tdepends on A\n\nconfig C\n\tbool \"c\"\n\tselect D if B\n\nconfig D\n\tbool \"d\"\n";
    let mut model = load("invariants", src);
    let b = sym(&model, "B");
    let c = sym(&model, "C");
    model.set_value(b, "m");
    model.set_value(c, "y");

    for id in model.all_symbols().collect::<Vec<_>>() {
        let kind = model.sym(id).kind();
        if !matches!(kind, SymbolKind::Bool | SymbolKind::Tristate) {
            continue;
        }
        let value = model.tristate_value(id);
        let assignable = model.assignable(id);
        if model.visibility(id) != Tristate::No {
            assert!(
                assignable.contains(&value),
                "{}: value {} outside assignable {:?}",
                model.sym(id).name(),
                value,
                assignable
            );
        }
    }

    // The selected symbol never drops below its reverse dependency.
    assert_eq!(tri(&model, "D"), Tristate::Yes);
}

#[test]
fn select_cycles_resolve_without_hanging() {
    let src = "config A\n\tbool \"a\"\n\tselect B\n\nconfig B\n\tbool \"b\"\n\tselect A\n";
    let mut model = load("cycle", src);
    let a = sym(&model, "A");

    // Nothing enabled: the cycle settles at n.
    assert_eq!(tri(&model, "A"), Tristate::No);
    assert_eq!(tri(&model, "B"), Tristate::No);

    // Enabling one side pulls the other up through the cycle.
    model.set_value(a, "y");
    assert_eq!(tri(&model, "B"), Tristate::Yes);
}

#[test]
fn eval_expression_matches_condition_semantics() {
    let src = "config MODULES\n\tbool \"modules\"\n\tdefault y\n\toption modules\n\nconfig FOO\n\ttristate \"foo\"\n\nconfig BAR\n\tint \"bar\"\n\tdefault 7\n\nconfig NAME\n\tstring \"name\"\n\tdefault \"zephyr\"\n";
    let mut model = load("eval_expr", src);
    let foo = sym(&model, "FOO");

    model.set_value(foo, "m");
    assert_eq!(model.eval_expression("FOO").unwrap(), Tristate::Mod);
    assert_eq!(model.eval_expression("!FOO").unwrap(), Tristate::Mod);
    assert_eq!(model.eval_expression("FOO = m").unwrap(), Tristate::Yes);
    assert_eq!(
        model.eval_expression("FOO && y").unwrap(),
        Tristate::Mod
    );
    assert_eq!(model.eval_expression("FOO || n").unwrap(), Tristate::Mod);

    // Numeric comparison when both sides parse as numbers.
    assert_eq!(model.eval_expression("BAR > 5").unwrap(), Tristate::Yes);
    assert_eq!(model.eval_expression("BAR < 5").unwrap(), Tristate::No);
    assert_eq!(model.eval_expression("BAR = 7").unwrap(), Tristate::Yes);

    // Lexicographic equality for strings.
    assert_eq!(
        model.eval_expression("NAME = \"zephyr\"").unwrap(),
        Tristate::Yes
    );
    // Ordering relations on non-numbers are n.
    assert_eq!(
        model.eval_expression("NAME > \"aaa\"").unwrap(),
        Tristate::No
    );

    // `m` is rewritten to m && MODULES.
    assert_eq!(model.eval_expression("m").unwrap(), Tristate::Mod);

    assert!(model.eval_expression("FOO &&").is_err());
}

#[test]
fn set_value_rejections_are_reported() {
    let src = "config HIDDEN\n\tbool \"hidden\"\n\tdepends on GATE\n\nconfig GATE\n\tbool \"gate\"\n\nconfig T\n\ttristate \"t\"\n";
    let mut model = load("rejections", src);
    let hidden = sym(&model, "HIDDEN");
    let t = sym(&model, "T");

    // Invisible symbol with no selector: stored but ineffective.
    assert!(!model.set_value(hidden, "y"));
    assert_eq!(tri(&model, "HIDDEN"), Tristate::No);

    // m on a tristate without modules degrades; without a MODULES symbol
    // the type presents as bool, so m is not assignable.
    assert!(!model.set_value(t, "m"));

    // Type-invalid values are ignored outright and leave the stored
    // user value untouched.
    assert!(!model.set_value(t, "maybe"));
    assert_eq!(model.sym(t).user_value(), Some("m"));
}

#[test]
fn unset_values_restores_defaults() {
    let mut model = load(
        "unset",
        "config A\n\tbool \"a\"\n\tdefault y\n\nconfig B\n\tint \"b\"\n\tdefault 3\n",
    );
    let a = sym(&model, "A");
    let b = sym(&model, "B");

    model.set_value(a, "n");
    model.set_value(b, "9");
    assert_eq!(tri(&model, "A"), Tristate::No);
    assert_eq!(model.string_value(b), "9");

    model.unset_values();
    assert_eq!(tri(&model, "A"), Tristate::Yes);
    assert_eq!(model.string_value(b), "3");
    assert_eq!(model.sym(a).user_value(), None);
}

#[test]
fn env_option_binds_default_at_parse_time() {
    std::env::set_var("KCONFIG_EVAL_ARCH_TEST", "riscv");
    let model = load(
        "env_opt",
        "config ARCH\n\tstring\n\toption env=\"KCONFIG_EVAL_ARCH_TEST\"\n",
    );
    let arch = sym(&model, "ARCH");
    assert_eq!(model.string_value(arch), "riscv");

    // Later environment changes do not affect the model.
    std::env::set_var("KCONFIG_EVAL_ARCH_TEST", "arm64");
    assert_eq!(model.string_value(arch), "riscv");
}

#[test]
fn option_modules_on_other_symbols_warns() {
    let model = load(
        "modules_warn",
        "config NOT_MODULES\n\tbool \"x\"\n\toption modules\n",
    );
    assert!(model
        .warnings()
        .iter()
        .any(|w| w.message.contains("option modules")
            || w.message.contains("modules symbol")));
}

#[test]
fn allnoconfig_y_flag_is_exposed() {
    let model = load(
        "allno",
        "config EXPERT_HIDE\n\tbool \"x\"\n\toption allnoconfig_y\n",
    );
    let id = sym(&model, "EXPERT_HIDE");
    assert!(model.sym(id).is_allnoconfig_y());
}

#[test]
fn string_defaults_follow_other_symbols() {
    let mut model = load(
        "string_follow",
        "config BASE\n\tstring \"base\"\n\tdefault \"generic\"\n\nconfig DERIVED\n\tstring \"derived\"\n\tdefault BASE\n",
    );
    let base = sym(&model, "BASE");
    let derived = sym(&model, "DERIVED");

    assert_eq!(model.string_value(derived), "generic");
    model.set_value(base, "custom");
    assert_eq!(model.string_value(derived), "custom");

    match model.value(derived) {
        SymbolValue::String(s) => assert_eq!(s, "custom"),
        other => panic!("expected string value, got {:?}", other),
    }
}

#[test]
fn undefined_symbols_compare_as_their_name() {
    let mut model = load(
        "undef_quirk",
        "config KNOWN\n\tbool \"known\"\n\tdefault y if UNDEFINED = \"UNDEFINED\"\n",
    );
    assert_eq!(tri(&model, "KNOWN"), Tristate::Yes);
    assert_eq!(
        model.eval_expression("UNDEFINED = \"UNDEFINED\"").unwrap(),
        Tristate::Yes
    );
}

#[test]
fn iter_items_walks_in_display_order() {
    let src = "menu \"Top\"\n\nconfig A\n\tbool \"a\"\n\nmenu \"Inner\"\n\nconfig B\n\tbool \"b\"\n\nendmenu\n\nconfig C\n\tbool \"c\"\n\nendmenu\n";
    let model = load("iter_items", src);

    let names: Vec<String> = model
        .iter_items()
        .map(|id| {
            let node = model.node(id);
            match node.item() {
                kconfig_eval::Item::Symbol(s) => model.sym(s).name().to_string(),
                kconfig_eval::Item::Menu => format!("menu:{}", node.prompt().unwrap_or("")),
                other => format!("{:?}", other),
            }
        })
        .collect();

    assert_eq!(
        names,
        vec!["menu:Top", "A", "menu:Inner", "B", "C"]
    );
}
