use lalrgen::generator::Generator;
use lalrgen::grammar::{
    Assoc, Grammar, GrammarDef, NonterminalID, Precedence, SymbolID::*, TerminalID,
};
use lalrgen::item::ItemCore;
use lalrgen::parse_table::{Action, ParseTable};
use lalrgen::parser::{ParseEvent, Parser};

fn init_tracing() {
    use tracing::Level;
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Feed a token across the reduces it triggers, recording each reduced
/// production tag, until it is shifted (or the input is accepted).
fn feed_tracing(parser: &mut Parser<'_>, g: &Grammar, token: TerminalID, tags: &mut Vec<String>) {
    loop {
        match parser.feed(token).unwrap() {
            ParseEvent::Shift(..) => break,
            ParseEvent::Reduce(p) => tags.push(g.production(p).tag().to_owned()),
            ParseEvent::Accept(p) => {
                tags.push(g.production(p).tag().to_owned());
                break;
            }
        }
    }
}

// S : a
fn trivial() -> (Grammar, TerminalID) {
    let mut def = GrammarDef::default();
    let a = def.terminal("a", None).unwrap();
    let s = def.nonterminal("S").unwrap();
    def.rule("s_a", s, [T(a)], None).unwrap();
    (def.end().unwrap(), a)
}

#[test]
fn trivial_grammar_trace() {
    init_tracing();
    let (grammar, a) = trivial();
    let table = ParseTable::generate(&grammar).unwrap();
    let s = grammar.start_symbol();
    let s_a = grammar.production_by_tag(s, "s_a").unwrap();

    let mut parser = Parser::new(&table);
    assert!(matches!(parser.feed(a), Ok(ParseEvent::Shift(..))));
    assert_eq!(parser.feed(TerminalID::EOI), Ok(ParseEvent::Reduce(s_a)));
    assert!(matches!(
        parser.feed(TerminalID::EOI),
        Ok(ParseEvent::Accept(..))
    ));
}

// S : X X
// X : a X | b
struct Repetition {
    grammar: Grammar,
    a: TerminalID,
    b: TerminalID,
    x: NonterminalID,
}

fn repetition() -> Repetition {
    let mut def = GrammarDef::default();
    let a = def.terminal("a", None).unwrap();
    let b = def.terminal("b", None).unwrap();
    let s = def.nonterminal("S").unwrap();
    let x = def.nonterminal("X").unwrap();
    def.rule("s_xx", s, [N(x), N(x)], None).unwrap();
    def.rule("x_rec", x, [T(a), N(x)], None).unwrap();
    def.rule("x_b", x, [T(b)], None).unwrap();
    Repetition {
        grammar: def.end().unwrap(),
        a,
        b,
        x,
    }
}

#[test]
fn repetition_family_merges_to_seven_states() {
    init_tracing();
    let fixture = repetition();
    let g = &fixture.grammar;

    let family = Generator::new(g).family();
    assert_eq!(family.len(), 7);

    let table = ParseTable::generate(g).unwrap();
    assert_eq!(table.states(), 7);

    let mut parser = Parser::new(&table);
    parser
        .parse([fixture.b, fixture.a, fixture.a, fixture.b])
        .unwrap();
}

#[test]
fn repetition_reduce_lookaheads_are_merged() {
    let fixture = repetition();
    let g = &fixture.grammar;
    let table = ParseTable::generate(g).unwrap();
    let x_b = g.production_by_tag(fixture.x, "x_b").unwrap();

    // the state reached over `b` keeps one merged reduce row: every context
    // of `X : b ·` contributes, so a, b and eof all reduce
    let mut parser = Parser::new(&table);
    let after_b = match parser.feed(fixture.b) {
        Ok(ParseEvent::Shift(state)) => state,
        event => panic!("unexpected event: {:?}", event),
    };
    for lookahead in [fixture.a, fixture.b, TerminalID::EOI] {
        assert_eq!(table.action(after_b, lookahead), Action::Reduce(x_b));
    }
}

// S : E
// E : E + T | T
// T : id | ( E )
struct Expressions {
    grammar: Grammar,
    plus: TerminalID,
    id: TerminalID,
    lparen: TerminalID,
    rparen: TerminalID,
}

fn expressions() -> Expressions {
    let mut def = GrammarDef::default();
    let plus = def.terminal("PLUS", None).unwrap();
    let id = def.terminal("ID", None).unwrap();
    let lparen = def.terminal("LPAREN", None).unwrap();
    let rparen = def.terminal("RPAREN", None).unwrap();
    let s = def.nonterminal("S").unwrap();
    let e = def.nonterminal("E").unwrap();
    let t = def.nonterminal("T").unwrap();
    def.rule("s_e", s, [N(e)], None).unwrap();
    def.rule("e_add", e, [N(e), T(plus), N(t)], None).unwrap();
    def.rule("e_term", e, [N(t)], None).unwrap();
    def.rule("t_id", t, [T(id)], None).unwrap();
    def.rule("t_paren", t, [T(lparen), N(e), T(rparen)], None)
        .unwrap();
    Expressions {
        grammar: def.end().unwrap(),
        plus,
        id,
        lparen,
        rparen,
    }
}

#[test]
fn expression_grammar_has_ten_states_and_accepts() {
    init_tracing();
    let fixture = expressions();
    let g = &fixture.grammar;

    let table = ParseTable::generate(g).unwrap();
    assert_eq!(table.states(), 10);

    // id + ( id )
    let mut parser = Parser::new(&table);
    parser
        .parse([
            fixture.id,
            fixture.plus,
            fixture.lparen,
            fixture.id,
            fixture.rparen,
        ])
        .unwrap();
}

#[test]
fn expression_grammar_rejects_bad_input() {
    let fixture = expressions();
    let table = ParseTable::generate(&fixture.grammar).unwrap();

    // id id
    let mut parser = Parser::new(&table);
    let err = parser.parse([fixture.id, fixture.id]).unwrap_err();
    assert_eq!(err.lookahead, fixture.id);
    assert!(!parser.stack().is_empty());

    // ( id
    let mut parser = Parser::new(&table);
    let err = parser.parse([fixture.lparen, fixture.id]).unwrap_err();
    assert_eq!(err.lookahead, TerminalID::EOI);
}

#[test]
fn regeneration_is_deterministic() {
    let fixture = expressions();
    let first = ParseTable::generate(&fixture.grammar).unwrap();
    let second = ParseTable::generate(&fixture.grammar).unwrap();
    assert_eq!(first, second);
}

// S : if E then S | if E then S else S | a
// E : b
#[test]
fn dangling_else_is_a_shift_reduce_conflict() {
    init_tracing();
    let mut def = GrammarDef::default();
    let t_if = def.terminal("IF", None).unwrap();
    let t_then = def.terminal("THEN", None).unwrap();
    let t_else = def.terminal("ELSE", None).unwrap();
    let t_a = def.terminal("A", None).unwrap();
    let t_b = def.terminal("B", None).unwrap();
    let s = def.nonterminal("S").unwrap();
    let e = def.nonterminal("E").unwrap();
    def.rule("s_if", s, [T(t_if), N(e), T(t_then), N(s)], None)
        .unwrap();
    def.rule(
        "s_if_else",
        s,
        [T(t_if), N(e), T(t_then), N(s), T(t_else), N(s)],
        None,
    )
    .unwrap();
    def.rule("s_a", s, [T(t_a)], None).unwrap();
    def.rule("e_b", e, [T(t_b)], None).unwrap();
    let grammar = def.end().unwrap();

    let s_if = grammar.production_by_tag(s, "s_if").unwrap();
    let s_if_else = grammar.production_by_tag(s, "s_if_else").unwrap();

    let generator = Generator::new(&grammar);
    let family = generator.family();
    let conflict = generator.emit(&family).unwrap_err();

    assert_eq!(conflict.lookahead, t_else);
    assert!(matches!(conflict.existing, Action::Shift(..)));
    assert_eq!(conflict.incoming, Action::Reduce(s_if));

    // the offending state holds the completed `if` item next to the
    // `· else` item
    let state = family.state(conflict.state);
    assert!(state.contains(&ItemCore {
        production: s_if,
        dot: 4,
    }));
    assert!(state.contains(&ItemCore {
        production: s_if_else,
        dot: 4,
    }));
}

// S : a X c | b X d
// X : e Y
// Y : f
//
// The states reached over `a e` and `b e` share their cores with different
// lookaheads, so the LALR family keeps a single copy with the union.
struct Merging {
    grammar: Grammar,
    a: TerminalID,
    b: TerminalID,
    c: TerminalID,
    d: TerminalID,
    e: TerminalID,
    f: TerminalID,
    x: NonterminalID,
    y: NonterminalID,
}

fn merging() -> Merging {
    let mut def = GrammarDef::default();
    let a = def.terminal("a", None).unwrap();
    let b = def.terminal("b", None).unwrap();
    let c = def.terminal("c", None).unwrap();
    let d = def.terminal("d", None).unwrap();
    let e = def.terminal("e", None).unwrap();
    let f = def.terminal("f", None).unwrap();
    let s = def.nonterminal("S").unwrap();
    let x = def.nonterminal("X").unwrap();
    let y = def.nonterminal("Y").unwrap();
    def.rule("s_axc", s, [T(a), N(x), T(c)], None).unwrap();
    def.rule("s_bxd", s, [T(b), N(x), T(d)], None).unwrap();
    def.rule("x_ey", x, [T(e), N(y)], None).unwrap();
    def.rule("y_f", y, [T(f)], None).unwrap();
    Merging {
        grammar: def.end().unwrap(),
        a,
        b,
        c,
        d,
        e,
        f,
        x,
        y,
    }
}

#[test]
fn lalr_merge_unions_lookaheads_and_recloses() {
    init_tracing();
    let fixture = merging();
    let g = &fixture.grammar;
    let x_ey = g.production_by_tag(fixture.x, "x_ey").unwrap();
    let y_f = g.production_by_tag(fixture.y, "y_f").unwrap();

    let family = Generator::new(g).family();
    assert_eq!(family.len(), 11);

    // exactly one state holds `X : e · Y`, reached from both contexts
    let merged: Vec<_> = family
        .states()
        .filter(|(_, set)| {
            set.contains(&ItemCore {
                production: x_ey,
                dot: 1,
            })
        })
        .collect();
    assert_eq!(merged.len(), 1);
    let (_, merged) = merged[0];

    // `Y : · f` was introduced by closure, and re-closure after the merge
    // widened it to the full union of both contexts
    let closure_lookahead = merged.lookahead(&ItemCore::start(y_f)).unwrap();
    assert!(closure_lookahead.contains(fixture.c));
    assert!(closure_lookahead.contains(fixture.d));

    // the union propagated through GOTO into the reduce state of `Y : f ·`
    let (_, reduce_state) = family
        .states()
        .find(|(_, set)| {
            set.contains(&ItemCore {
                production: y_f,
                dot: 1,
            })
        })
        .unwrap();
    let reduce_lookahead = reduce_state
        .lookahead(&ItemCore {
            production: y_f,
            dot: 1,
        })
        .unwrap();
    assert!(reduce_lookahead.contains(fixture.c));
    assert!(reduce_lookahead.contains(fixture.d));

    // both sentences drive through the merged state
    let table = ParseTable::generate(g).unwrap();
    let mut parser = Parser::new(&table);
    parser
        .parse([fixture.a, fixture.e, fixture.f, fixture.c])
        .unwrap();
    let mut parser = Parser::new(&table);
    parser
        .parse([fixture.b, fixture.e, fixture.f, fixture.d])
        .unwrap();

    // the merge may allow extra reduces, but the mismatched continuation is
    // still rejected
    let mut parser = Parser::new(&table);
    parser
        .parse([fixture.a, fixture.e, fixture.f, fixture.d])
        .unwrap_err();
}

// E : E + E | E * E | E < E | num
struct Arithmetic {
    grammar: Grammar,
    plus: TerminalID,
    star: TerminalID,
    lt: TerminalID,
    num: TerminalID,
}

fn arithmetic() -> Arithmetic {
    let mut def = GrammarDef::default();
    let lt = def
        .terminal("LT", Some(Precedence::new(1, Assoc::Nonassoc)))
        .unwrap();
    let plus = def
        .terminal("PLUS", Some(Precedence::new(2, Assoc::Left)))
        .unwrap();
    let star = def
        .terminal("STAR", Some(Precedence::new(3, Assoc::Left)))
        .unwrap();
    let num = def.terminal("NUM", None).unwrap();
    let e = def.nonterminal("E").unwrap();
    def.rule("e_add", e, [N(e), T(plus), N(e)], None).unwrap();
    def.rule("e_mul", e, [N(e), T(star), N(e)], None).unwrap();
    def.rule("e_cmp", e, [N(e), T(lt), N(e)], None).unwrap();
    def.rule("e_num", e, [T(num)], None).unwrap();
    Arithmetic {
        grammar: def.end().unwrap(),
        plus,
        star,
        lt,
        num,
    }
}

#[test]
fn precedence_settles_shift_reduce_pairs() {
    init_tracing();
    let fixture = arithmetic();
    let g = &fixture.grammar;
    let table = ParseTable::generate(g).unwrap();

    // num + num * num — the multiplication reduces first
    let mut parser = Parser::new(&table);
    let mut tags = Vec::new();
    for token in [
        fixture.num,
        fixture.plus,
        fixture.num,
        fixture.star,
        fixture.num,
    ] {
        feed_tracing(&mut parser, g, token, &mut tags);
    }
    feed_tracing(&mut parser, g, TerminalID::EOI, &mut tags);
    let compound: Vec<_> = tags.iter().filter(|tag| *tag != "e_num").collect();
    assert_eq!(compound, ["e_mul", "e_add", "$accept"]);

    // num + num + num — left associativity reduces eagerly
    let mut parser = Parser::new(&table);
    let mut tags = Vec::new();
    for token in [
        fixture.num,
        fixture.plus,
        fixture.num,
        fixture.plus,
        fixture.num,
    ] {
        feed_tracing(&mut parser, g, token, &mut tags);
    }
    feed_tracing(&mut parser, g, TerminalID::EOI, &mut tags);
    assert_eq!(
        tags,
        ["e_num", "e_num", "e_add", "e_num", "e_add", "$accept"]
    );
}

#[test]
fn nonassociative_chains_are_rejected() {
    let fixture = arithmetic();
    let table = ParseTable::generate(&fixture.grammar).unwrap();

    // num < num < num
    let mut parser = Parser::new(&table);
    let err = parser
        .parse([
            fixture.num,
            fixture.lt,
            fixture.num,
            fixture.lt,
            fixture.num,
        ])
        .unwrap_err();
    assert_eq!(err.lookahead, fixture.lt);

    // a single comparison still parses
    let mut parser = Parser::new(&table);
    parser
        .parse([fixture.num, fixture.lt, fixture.num])
        .unwrap();
}

#[test]
fn conflicting_grammar_without_precedence_fails() {
    // the same arithmetic shape minus precedence declarations
    let mut def = GrammarDef::default();
    let plus = def.terminal("PLUS", None).unwrap();
    let num = def.terminal("NUM", None).unwrap();
    let e = def.nonterminal("E").unwrap();
    def.rule("e_add", e, [N(e), T(plus), N(e)], None).unwrap();
    def.rule("e_num", e, [T(num)], None).unwrap();
    let grammar = def.end().unwrap();

    let conflict = ParseTable::generate(&grammar).unwrap_err();
    assert_eq!(conflict.lookahead, plus);
    assert!(matches!(conflict.existing, Action::Shift(..)));
    assert!(matches!(conflict.incoming, Action::Reduce(..)));
}
