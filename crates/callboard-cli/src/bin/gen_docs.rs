//! Prints the option reference for `callboard` as a markdown table.

fn main() {
    print!("{}", callboard_cli::render_options_markdown());
}
