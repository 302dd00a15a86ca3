use std::env;
use std::fs;
use std::io;
use std::io::Write;
use std::process;

use pika_peg::{Grammar, GrammarParseError, GrowParser, PikaParser};

type Err = Box<dyn std::error::Error + 'static>;

fn usage(prog_name: &str) -> String {
  format!(
    r"
Usage: {} FILE [options]

Options:
  -h, --help    Print this message
  -c, --chart   Print the memo table alongside the parse result
  -g, --grow    Use the top-down grow-the-seed driver instead of bottom-up Pika",
    prog_name
  )
}

fn parse_line(grammar: &Grammar, line: &str, print_chart: bool, use_grow: bool) {
  if use_grow {
    let parser = GrowParser::new(grammar, line);
    let tree = parser.parse();
    print_result(&tree);
    if print_chart {
      print_chart_summary(parser.memo_table(), line.len());
    }
  } else {
    let parser = PikaParser::new(grammar, line);
    let tree = parser.parse();
    print_result(&tree);
    if print_chart {
      print_chart_summary(parser.memo_table(), line.len());
    }
  }
}

fn print_result(tree: &Option<pika_peg::ParseTree>) {
  match tree {
    Some(tree) => println!("{tree}"),
    None => println!("no parse"),
  }
}

fn print_chart_summary(memo: &pika_peg::MemoTable, input_len: usize) {
  println!("chart:");
  for pos in 0..=input_len {
    let entries: Vec<_> = memo.entries_at(pos).collect();
    if entries.is_empty() {
      continue;
    }
    println!("  pos {pos}: {} entries", entries.len());
  }
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let opts: Vec<String> = env::args().collect();
  let prog_name = opts[0].clone();

  if opts.len() < 2 {
    println!("{}", usage(&prog_name));
    process::exit(1);
  }

  let mut opts = opts.into_iter().skip(1);
  let filename = opts.next().unwrap();

  let mut print_chart = false;
  let mut use_grow = false;
  for o in opts {
    if o == "-h" || o == "--help" {
      println!("{}", usage(&prog_name));
      process::exit(0);
    } else if o == "-c" || o == "--chart" {
      print_chart = true;
    } else if o == "-g" || o == "--grow" {
      use_grow = true;
    }
  }

  let source = fs::read_to_string(&filename)?;
  let grammar: Grammar = source.parse().map_err(|e: GrammarParseError| -> Err { Box::new(e) })?;

  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(0) => return Ok(()),
      Ok(_) => {
        parse_line(&grammar, input.trim(), print_chart, use_grow);
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}
