use interpreter::{
    ExceptionKind, Namespace, ScriptOutcome, Value, check_script, check_session, parse_expression,
    replay_session, run_script,
};

fn run(source: &str) -> String {
    let mut namespace = Namespace::new();
    match run_script(source, &mut namespace) {
        ScriptOutcome::Completed { output } => output.unwrap_or_default(),
        ScriptOutcome::Faulted { description, .. } => panic!("script faulted: {}", description),
    }
}

fn run_trimmed(source: &str) -> String {
    run(source).trim_end().to_string()
}

fn fault(source: &str) -> String {
    let mut namespace = Namespace::new();
    match run_script(source, &mut namespace) {
        ScriptOutcome::Faulted { description, .. } => description,
        ScriptOutcome::Completed { output } => panic!("expected a fault, got {:?}", output),
    }
}

fn session(source: &str) -> String {
    let mut namespace = Namespace::new();
    replay_session(source, &mut namespace)
}

// ---------------------------------------------------------------------------
// Script executor
// ---------------------------------------------------------------------------

#[test]
fn print_is_captured() {
    assert_eq!(run("print('hello')"), "hello\n");
    assert_eq!(run("print(1, 2, 3)"), "1 2 3\n");
    assert_eq!(run("print('a', 'b', sep='-', end='!')"), "a-b!");
    assert_eq!(run("print()"), "\n");
}

#[test]
fn no_output_is_absent() {
    let mut namespace = Namespace::new();
    let outcome = run_script("x = 1", &mut namespace);
    assert_eq!(outcome, ScriptOutcome::Completed { output: None });
    assert_eq!(outcome.into_output(), None);
}

#[test]
fn fault_description_replaces_output() {
    let mut namespace = Namespace::new();
    let outcome = run_script("print('before')\nprint(undefined_name)", &mut namespace);
    assert!(outcome.is_fault());
    assert_eq!(
        outcome.clone(),
        ScriptOutcome::Faulted {
            description: "name 'undefined_name' is not defined".to_string(),
            output: "before\n".to_string(),
        }
    );
    assert_eq!(
        outcome.into_output().as_deref(),
        Some("name 'undefined_name' is not defined")
    );
}

#[test]
fn bindings_persist_across_scripts() {
    let mut namespace = Namespace::new();
    run_script("x = 40\ndef add(a, b=2):\n    return a + b", &mut namespace);
    let outcome = run_script("print(add(x))", &mut namespace);
    assert_eq!(outcome.into_output().as_deref(), Some("42\n"));
    assert_eq!(namespace.names(), vec!["add", "x"]);
}

#[test]
fn bindings_before_a_fault_survive() {
    let mut namespace = Namespace::new();
    let outcome = run_script("a = 1\nb = 1 / 0\nc = 3", &mut namespace);
    assert_eq!(outcome.into_output().as_deref(), Some("division by zero"));
    assert!(namespace.contains("a"));
    assert!(!namespace.contains("b"));
    assert!(!namespace.contains("c"));
}

#[test]
fn syntax_error_is_a_fault() {
    assert_eq!(fault("x = (1 +"), "'(' was never closed (<string>, line 1)");
    assert_eq!(fault("x = 1\ny = = 2"), "invalid syntax (<string>, line 2)");
    assert!(check_script("if x:\n    pass").is_ok());
    assert_eq!(check_script("return 5").unwrap_err().message, "'return' outside function");
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[test]
fn arithmetic() {
    assert_eq!(run_trimmed("print(2 + 3 * 4)"), "14");
    assert_eq!(run_trimmed("print((2 + 3) * 4)"), "20");
    assert_eq!(run_trimmed("print(7 / 2)"), "3.5");
    assert_eq!(run_trimmed("print(6 / 3)"), "2.0");
    assert_eq!(run_trimmed("print(7 // 2, -7 // 2)"), "3 -4");
    assert_eq!(run_trimmed("print(7 % 3, -7 % 3)"), "1 2");
    assert_eq!(run_trimmed("print(2 ** 10, 2 ** -1)"), "1024 0.5");
    assert_eq!(run_trimmed("print(-2 ** 2)"), "-4");
    assert_eq!(run_trimmed("print(2 ** 3 ** 2)"), "512");
    assert_eq!(run_trimmed("print(0.1 + 0.2)"), "0.30000000000000004");
    assert_eq!(run_trimmed("print(1e16, 1e-5, 1.5)"), "1e+16 1e-05 1.5");
}

#[test]
fn arithmetic_faults() {
    assert_eq!(fault("1 / 0"), "division by zero");
    assert_eq!(fault("1 // 0"), "integer division or modulo by zero");
    assert_eq!(fault("1.0 / 0"), "float division by zero");
    assert_eq!(
        fault("1 + 'a'"),
        "unsupported operand type(s) for +: 'int' and 'str'"
    );
    assert_eq!(fault("'a' + 1"), "can only concatenate str (not \"int\") to str");
    assert_eq!(fault("9223372036854775807 + 1"), "integer overflow");
}

#[test]
fn comparisons_and_logic() {
    assert_eq!(run_trimmed("print(1 < 2 < 3, 3 < 2 < 1)"), "True False");
    assert_eq!(run_trimmed("print(1 == 1.0, 'a' != 'b')"), "True True");
    assert_eq!(run_trimmed("print(0 or 'x', 1 and 0, not [])"), "x 0 True");
    assert_eq!(run_trimmed("print(2 in [1, 2], 'b' not in 'abc')"), "True False");
    assert_eq!(run_trimmed("print(None is None, [] is [])"), "True False");
    assert_eq!(
        fault("1 < 'a'"),
        "'<' not supported between instances of 'int' and 'str'"
    );
}

#[test]
fn conditional_expression() {
    assert_eq!(run_trimmed("x = 10\nprint('big' if x > 5 else 'small')"), "big");
    assert_eq!(run_trimmed("x = 1\nprint('big' if x > 5 else 'small')"), "small");
}

#[test]
fn reprs_follow_python() {
    assert_eq!(
        run_trimmed("print([1, 'a', None, True, 2.0])"),
        "[1, 'a', None, True, 2.0]"
    );
    assert_eq!(run_trimmed("print((1,), (1, 2), ())"), "(1,) (1, 2) ()");
    assert_eq!(run_trimmed("print({'a': 1, 2: [3]})"), "{'a': 1, 2: [3]}");
    assert_eq!(run_trimmed("print(repr(\"it's\"))"), "\"it's\"");
    assert_eq!(run_trimmed("print(range(3), range(1, 9, 2))"), "range(0, 3) range(1, 9, 2)");
    assert_eq!(run_trimmed("xs = [1]\nxs.append(xs)\nprint(xs)"), "[1, [...]]");
}

#[test]
fn strings_and_fstrings() {
    assert_eq!(run_trimmed("name = 'World'\nprint(f'Hello, {name}!')"), "Hello, World!");
    assert_eq!(run_trimmed("x = 3.14159\nprint(f'{x:.2f}|{x!r}')"), "3.14|3.14159");
    assert_eq!(run_trimmed("print(f'{42:>5}|{\"ab\":<4}|{7:03d}')"), "   42|ab  |007");
    assert_eq!(run_trimmed("print(f'{{literal}} {1234567:,}')"), "{literal} 1,234,567");
    assert_eq!(run_trimmed("print('ab' 'cd', 'x' * 3)"), "abcd xxx");
    assert_eq!(run_trimmed("print('''one\ntwo''')"), "one\ntwo");
    assert_eq!(run_trimmed("print('tab\\there')"), "tab\there");
    assert_eq!(run_trimmed("s = 'hello'\nprint(s[1], s[-1], s[1:3], s[::-1])"), "e o el olleh");
}

#[test]
fn string_methods() {
    assert_eq!(run_trimmed("print('a,b,,c'.split(','))"), "['a', 'b', '', 'c']");
    assert_eq!(run_trimmed("print('  a  b '.split())"), "['a', 'b']");
    assert_eq!(run_trimmed("print('-'.join(['x', 'y', 'z']))"), "x-y-z");
    assert_eq!(run_trimmed("print('  pad  '.strip(), 'Hi'.upper(), 'Hi'.lower())"), "pad HI hi");
    assert_eq!(run_trimmed("print('hello world'.title())"), "Hello World");
    assert_eq!(run_trimmed("print('banana'.count('a'), 'banana'.find('n'), 'x'.find('y'))"), "3 2 -1");
    assert_eq!(run_trimmed("print('aaa'.replace('a', 'b', 2))"), "bba");
    assert_eq!(run_trimmed("print('file.py'.endswith(('.rs', '.py')))"), "True");
    assert_eq!(run_trimmed("print('{} + {} = {total}'.format(1, 2, total=3))"), "1 + 2 = 3");
    assert_eq!(fault("'abc'.nope()"), "'str' object has no attribute 'nope'");
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

#[test]
fn lists_alias_and_mutate() {
    let source = "\
a = [3, 1, 2]
b = a
b.append(4)
a.sort()
print(a, b)
a += [5]
print(b)
print(a.pop(), a.pop(0), a)
";
    assert_eq!(run(source), "[1, 2, 3, 4] [1, 2, 3, 4]\n[1, 2, 3, 4, 5]\n5 1 [2, 3, 4]\n");
}

#[test]
fn list_indexing_and_slicing() {
    assert_eq!(run_trimmed("xs = [0, 1, 2, 3, 4]\nprint(xs[1:3], xs[-2:], xs[::2])"), "[1, 2] [3, 4] [0, 2, 4]");
    assert_eq!(run_trimmed("xs = [0, 1, 2]\nxs[0] = 9\ndel xs[1]\nprint(xs)"), "[9, 2]");
    assert_eq!(run_trimmed("xs = [0, 1, 2, 3]\nxs[1:3] = ['a']\nprint(xs)"), "[0, 'a', 3]");
    assert_eq!(fault("[1, 2][5]"), "list index out of range");
    assert_eq!(fault("[].pop()"), "pop from empty list");
    assert_eq!(fault("[1].remove(2)"), "list.remove(x): x not in list");
}

#[test]
fn dicts() {
    let source = "\
d = {'a': 1}
d['b'] = 2
d['a'] = 10
print(d, len(d), 'a' in d)
print(d.get('z'), d.get('z', 0), d.keys(), d.values())
for k, v in d.items():
    print(k, v)
print(d.pop('a'), d)
";
    assert_eq!(
        run(source),
        "{'a': 10, 'b': 2} 2 True\nNone 0 ['a', 'b'] [10, 2]\na 10\nb 2\n10 {'b': 2}\n"
    );
    assert_eq!(fault("d = {}\nd['missing']"), "'missing'");
    assert_eq!(fault("d = {}\nd[[1]] = 2"), "unhashable type: 'list'");
}

#[test]
fn tuples_unpack() {
    assert_eq!(run_trimmed("a, b = 1, 2\na, b = b, a\nprint(a, b)"), "2 1");
    assert_eq!(run_trimmed("x = y = 5\nprint(x + y)"), "10");
    assert_eq!(fault("a, b = [1, 2, 3]"), "too many values to unpack (expected 2)");
    assert_eq!(fault("a, b, c = 1, 2"), "not enough values to unpack (expected 3, got 2)");
}

#[test]
fn comprehensions() {
    assert_eq!(run_trimmed("print([x * x for x in range(5) if x % 2 == 0])"), "[0, 4, 16]");
    assert_eq!(
        run_trimmed("pairs = [(k, v) for k, v in {'a': 1, 'b': 2}.items()]\nprint(pairs)"),
        "[('a', 1), ('b', 2)]"
    );
    assert_eq!(run_trimmed("print(sum(x for x in [1, 2, 3]))"), "6");
    let mut namespace = Namespace::new();
    run_script("squares = [i * i for i in range(3)]", &mut namespace);
    assert!(!namespace.contains("i"));
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[test]
fn control_flow() {
    let source = "\
total = 0
for i in range(10):
    if i == 7:
        break
    if i % 2:
        continue
    total += i
print(total)
n = 3
while n > 0:
    n -= 1
else_branch = 'neg' if n < 0 else 'zero'
print(n, else_branch)
";
    assert_eq!(run(source), "12\n0 zero\n");
}

#[test]
fn if_elif_else() {
    let source = "\
def classify(n):
    if n < 0:
        return 'negative'
    elif n == 0:
        return 'zero'
    else:
        return 'positive'
print(classify(-1), classify(0), classify(5))
";
    assert_eq!(run_trimmed(source), "negative zero positive");
}

#[test]
fn functions_and_recursion() {
    let source = "\
def fib(n):
    if n < 2:
        return n
    return fib(n - 1) + fib(n - 2)
print(fib(15))
def greet(name, greeting='Hello'):
    return f'{greeting}, {name}'
print(greet('Ada'), greet('Bob', greeting='Hi'))
print(greet)
";
    assert_eq!(run(source), "610\nHello, Ada Hi, Bob\n<function greet>\n");
}

#[test]
fn function_argument_errors() {
    assert_eq!(
        fault("def f(a, b):\n    pass\nf(1)"),
        "f() missing 1 required positional argument: 'b'"
    );
    assert_eq!(
        fault("def f(a):\n    pass\nf(1, 2)"),
        "f() takes 1 positional argument but 2 were given"
    );
    assert_eq!(
        fault("def f(a):\n    pass\nf(b=1)"),
        "f() got an unexpected keyword argument 'b'"
    );
}

#[test]
fn unbounded_recursion_is_a_fault() {
    let mut namespace = Namespace::new();
    let outcome = run_script("def f(n):\n    return f(n + 1)\nf(0)", &mut namespace);
    assert_eq!(
        outcome.into_output().as_deref(),
        Some("maximum recursion depth exceeded")
    );
}

#[test]
fn globals_and_locals() {
    let source = "\
counter = 0
def bump():
    global counter
    counter += 1
def shadow():
    counter = 100
    return counter
bump()
bump()
print(counter, shadow(), counter)
";
    assert_eq!(run_trimmed(source), "2 100 2");
}

#[test]
fn try_except_finally() {
    let source = "\
def safe_div(a, b):
    try:
        result = a / b
    except ZeroDivisionError as e:
        print('caught:', e)
        return None
    else:
        return result
    finally:
        print('done')
print(safe_div(6, 3))
print(safe_div(1, 0))
";
    assert_eq!(run(source), "done\n2.0\ncaught: division by zero\ndone\nNone\n");
}

#[test]
fn raise_and_catch_by_parent_class() {
    let source = "\
try:
    raise ValueError('bad value')
except (TypeError, KeyError):
    print('wrong handler')
except Exception as error:
    print(type(error), error)
";
    assert_eq!(run_trimmed(source), "<class 'ValueError'> bad value");
    assert_eq!(fault("raise KeyError('k')"), "'k'");
    assert_eq!(fault("try:\n    1 / 0\nexcept ZeroDivisionError:\n    raise"), "division by zero");
    assert_eq!(fault("assert 1 == 2, 'math is broken'"), "math is broken");
}

#[test]
fn delete_names() {
    assert_eq!(fault("x = 1\ndel x\nprint(x)"), "name 'x' is not defined");
}

#[test]
fn builtins() {
    assert_eq!(run_trimmed("print(len('abc'), len([1, 2]), len({}))"), "3 2 0");
    assert_eq!(run_trimmed("print(min(3, 1, 2), max([4, 9, 2]), abs(-5))"), "1 9 5");
    assert_eq!(run_trimmed("print(sorted([3, 1, 2], reverse=True))"), "[3, 2, 1]");
    assert_eq!(run_trimmed("print(sorted(['bb', 'a', 'ccc'], key=len))"), "['a', 'bb', 'ccc']");
    assert_eq!(run_trimmed("print(list(enumerate('ab', 1)))"), "[(1, 'a'), (2, 'b')]");
    assert_eq!(run_trimmed("print(list(zip([1, 2, 3], 'ab')))"), "[(1, 'a'), (2, 'b')]");
    assert_eq!(run_trimmed("print(round(2.5), round(3.5), round(1.25, 1))"), "2 4 1.2");
    assert_eq!(run_trimmed("print(int('42'), float('1.5'), str(7), bool(''))"), "42 1.5 7 False");
    assert_eq!(run_trimmed("print(isinstance(True, int), isinstance('a', (int, str)))"), "True True");
    assert_eq!(run_trimmed("print(type(1), type('a'), type([]))"), "<class 'int'> <class 'str'> <class 'list'>");
    assert_eq!(run_trimmed("print(list(reversed([1, 2, 3])), dict(a=1))"), "[3, 2, 1] {'a': 1}");
    assert_eq!(fault("int('abc')"), "invalid literal for int() with base 10: 'abc'");
    assert_eq!(fault("len(5)"), "object of type 'int' has no len()");
}

#[test]
fn unsupported_syntax_is_reported() {
    let description = fault("import os");
    assert!(description.ends_with("(<string>, line 1)"), "{}", description);
}

// ---------------------------------------------------------------------------
// Session emulator
// ---------------------------------------------------------------------------

#[test]
fn session_echoes_results_with_repr() {
    assert_eq!(session(">>> 1 + 1"), ">>> 1 + 1\n2\n");
    assert_eq!(session(">>> 'hi'"), ">>> 'hi'\n'hi'\n");
    assert_eq!(session(">>> [1, 'a']"), ">>> [1, 'a']\n[1, 'a']\n");
}

#[test]
fn session_statements_produce_no_result() {
    assert_eq!(session(">>> x = 5\n>>> x * 2"), ">>> x = 5\n>>> x * 2\n10\n");
    assert_eq!(session(">>> del_me = 1\n>>> del del_me"), ">>> del_me = 1\n>>> del del_me\n");
}

#[test]
fn session_none_results_are_hidden() {
    assert_eq!(session(">>> None"), ">>> None\n");
    assert_eq!(session(">>> print('out')"), ">>> print('out')\nout\n");
}

#[test]
fn session_prints_before_result() {
    let source = ">>> def loud(x):\n...     print('computing')\n...     return x * 2\n>>> loud(21)";
    assert_eq!(
        session(source),
        ">>> def loud(x):\n...     print('computing')\n...     return x * 2\n>>> loud(21)\ncomputing\n42\n"
    );
}

#[test]
fn session_exception_replaces_output() {
    let source = ">>> print('partial'); 1 / 0\n>>> 'after'";
    assert_eq!(
        session(source),
        ">>> print('partial'); 1 / 0\nexception: division by zero\n>>> 'after'\n'after'\n"
    );
    assert_eq!(
        session(">>> undefined"),
        ">>> undefined\nexception: name 'undefined' is not defined\n"
    );
}

#[test]
fn session_syntax_error_is_an_exception_line() {
    assert_eq!(
        session(">>> x = = 1"),
        ">>> x = = 1\nexception: invalid syntax (<string>, line 1)\n"
    );
}

#[test]
fn session_unprompted_lines_are_echoed() {
    let source = "# a comment\n>>> 2 * 3\n6\n";
    assert_eq!(session(source), "# a comment\n>>> 2 * 3\n6\n6\n");
}

#[test]
fn session_shares_namespace_with_scripts() {
    let mut namespace = Namespace::new();
    run_script("greeting = 'hello'", &mut namespace);
    let transcript = replay_session(">>> greeting.upper()", &mut namespace);
    assert_eq!(transcript, ">>> greeting.upper()\n'HELLO'\n");
    assert!(matches!(namespace.get("greeting"), Some(Value::Str(s)) if s == "hello"));
}

#[test]
fn session_bare_tuple_is_an_expression() {
    assert_eq!(session(">>> 1, 2"), ">>> 1, 2\n(1, 2)\n");
    assert!(parse_expression("1, 2").is_ok());
    assert!(parse_expression("x = 1").is_err());
}

#[test]
fn check_session_maps_offsets_into_the_block() {
    let code = ">>> ok = 1\n>>> x = = 2\n";
    let errors = check_session(code);
    assert_eq!(errors.len(), 1);
    assert_eq!(&code[errors[0].span.start..errors[0].span.end], "=");
    assert_eq!(errors[0].span.start, 19);
}

#[test]
fn exception_kinds_nest() {
    assert!(ExceptionKind::RecursionError.is_subclass_of(ExceptionKind::RuntimeError));
    assert!(ExceptionKind::KeyError.is_subclass_of(ExceptionKind::Exception));
    assert!(!ExceptionKind::KeyError.is_subclass_of(ExceptionKind::IndexError));
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

#[test]
fn huge_repetition_faults_instead_of_allocating() {
    let mut namespace = Namespace::new();
    assert!(run_script("s = 'ab' * (2**62)", &mut namespace).is_fault());
    assert!(run_script("xs = [1, 2] * (2**62)", &mut namespace).is_fault());
    assert!(run_script("t = (0,) * (2**62)", &mut namespace).is_fault());

    assert!(run_script("s = f'{1:>99999999999}'", &mut namespace).is_fault());

    let after = run_script("print('ab' * 3, [0] * 2)", &mut namespace);
    assert_eq!(after.into_output().as_deref(), Some("ababab [0, 0]\n"));
}

#[test]
fn memory_error_can_be_caught() {
    let source = "\
try:
    xs = list(range(10**12))
except MemoryError:
    print('too big')
";
    assert_eq!(run(source), "too big\n");
}

#[test]
fn deeply_nested_brackets_are_a_syntax_error() {
    let deep = format!("x = {}1{}", "(".repeat(300), ")".repeat(300));
    assert_eq!(fault(&deep), "too many nested parentheses (<string>, line 1)");

    let lists = format!("print({}{})", "[".repeat(50), "]".repeat(50));
    assert_eq!(
        run_trimmed(&lists),
        format!("{}{}", "[".repeat(50), "]".repeat(50))
    );
}

#[test]
fn deeply_nested_expressions_are_a_syntax_error() {
    let unary = format!("x = {}1", "-".repeat(300));
    assert_eq!(fault(&unary), "expression is nested too deeply (<string>, line 1)");

    let chain = format!("x = 1{}", " + 1".repeat(300));
    assert_eq!(fault(&chain), "expression is nested too deeply (<string>, line 1)");

    assert_eq!(run_trimmed(&format!("print(1{})", " + 1".repeat(100))), "101");
}

#[test]
fn deep_indentation_is_a_syntax_error() {
    let mut source = String::new();
    for depth in 0..120 {
        source.push_str(&"    ".repeat(depth));
        source.push_str("if True:\n");
    }
    source.push_str(&"    ".repeat(120));
    source.push_str("pass\n");
    assert!(fault(&source).starts_with("too many levels of indentation"));
}

#[test]
fn rounding_huge_floats_overflows() {
    assert_eq!(fault("round(1e300)"), "integer overflow");
    assert_eq!(fault("int(-1e19)"), "integer overflow");
    assert_eq!(
        fault("round(float('inf'))"),
        "cannot convert float infinity to integer"
    );
    assert_eq!(run_trimmed("print(round(2.5), round(-3.7), int(-2.9))"), "2 -4 -2");
}

#[test]
fn range_length_beyond_int_range_overflows() {
    assert_eq!(
        fault("len(range(-9223372036854775807 - 1, 9223372036854775807))"),
        "Python int too large to convert to C ssize_t"
    );
    assert_eq!(run_trimmed("print(len(range(10**12)))"), "1000000000000");
    assert_eq!(
        run_trimmed("r = range(-9223372036854775807 - 1, 9223372036854775807)\nprint(r[-1], 5 in r)"),
        "9223372036854775806 True"
    );
}

#[test]
fn key_error_repr_shows_the_key_once() {
    let source = "\
try:
    {}['k']
except KeyError as e:
    print(repr(e))
    print(e)
";
    assert_eq!(run(source), "KeyError('k')\n'k'\n");
    assert_eq!(run_trimmed("print(repr(ValueError('v')))"), "ValueError('v')");
}

#[test]
fn shift_operators() {
    assert_eq!(
        run_trimmed("print(1 << 4, 256 >> 2, -9 >> 1, 1 + 1 << 2, 1 << 2 < 5)"),
        "16 64 -5 8 True"
    );
    assert_eq!(run_trimmed("x = 3\nx <<= 2\nx >>= 1\nprint(x)"), "6");
    assert_eq!(run_trimmed("print(5 >> 100, -5 >> 100)"), "0 -1");
    assert_eq!(fault("1 << -1"), "negative shift count");
    assert_eq!(fault("1 << 63"), "integer overflow");
    assert_eq!(
        fault("1.0 << 2"),
        "unsupported operand type(s) for <<: 'float' and 'int'"
    );
}
