// Numbered menus. Each option carries an action value; the caller matches on
// the value returned by `choose` and runs the handler itself, which keeps the
// borrow of the API client in one place (the UI loop).

use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use std::fmt;
use std::io::{self, BufRead, IsTerminal, Write};

const SEPARATOR: &str = "----------------------------------";

#[derive(Debug, Clone)]
pub struct MenuOption<A> {
    id: usize,
    label: String,
    action: A,
}

impl<A> fmt::Display for MenuOption<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}) {}", self.id, self.label)
    }
}

#[derive(Debug, Clone)]
pub struct Menu<A> {
    name: String,
    header: String,
    options: Vec<MenuOption<A>>,
}

impl<A: Copy> Menu<A> {
    pub fn new(name: impl Into<String>) -> Self {
        Menu {
            name: name.into(),
            header: String::new(),
            options: Vec::new(),
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Append an option; options are numbered from 1 in insertion order.
    pub fn add_option(&mut self, label: impl Into<String>, action: A) -> &mut Self {
        let id = self.options.len() + 1;
        self.options.push(MenuOption {
            id,
            label: label.into(),
            action,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Action for a 1-based option number, `None` when out of range.
    pub fn option(&self, number: usize) -> Option<A> {
        number
            .checked_sub(1)
            .and_then(|i| self.options.get(i))
            .map(|o| o.action)
    }

    /// Title block shown above the selectable options.
    pub fn title(&self) -> String {
        let mut out = format!("\n{SEPARATOR}\n{}", self.name);
        if !self.header.is_empty() {
            out.push('\n');
            out.push_str(&self.header);
        }
        out
    }

    /// Show the menu and block until the user picks an option. Without a
    /// terminal on stdin the numbered listing is printed and a number is read
    /// per line instead.
    pub fn choose(&self) -> io::Result<A> {
        if !io::stdin().is_terminal() {
            return self.choose_from(&mut io::stdin().lock(), &mut io::stdout());
        }
        let items: Vec<String> = self.options.iter().map(ToString::to_string).collect();
        let index = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(self.title())
            .items(&items)
            .default(0)
            .interact()?;
        self.options
            .get(index)
            .map(|o| o.action)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "not a valid option"))
    }

    /// Line-based selection: print the menu, read a number, repeat until it
    /// names an option. End of input is an error.
    pub fn choose_from<R: BufRead, W: Write>(&self, input: &mut R, out: &mut W) -> io::Result<A> {
        let mut line = String::new();
        loop {
            write!(out, "{self}Enter selection then hit enter:\n:>")?;
            out.flush()?;
            line.clear();
            if input.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "input closed before an option was chosen",
                ));
            }
            match line.trim().parse::<usize>() {
                Ok(n) => match self.option(n) {
                    Some(action) => return Ok(action),
                    None => writeln!(out, "Not a valid option.")?,
                },
                Err(_) => writeln!(out, "Not a valid number.")?,
            }
        }
    }
}

impl<A> fmt::Display for Menu<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n{SEPARATOR}")?;
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", self.header)?;
        for option in &self.options {
            writeln!(f, "\t{option}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Action {
        Balance,
        Friends,
        Exit,
    }

    fn menu() -> Menu<Action> {
        let mut menu = Menu::new("Main Menu").with_header("Account : alice");
        menu.add_option("Show Balance", Action::Balance)
            .add_option("List Friends", Action::Friends)
            .add_option("Exit", Action::Exit);
        menu
    }

    #[test]
    fn options_are_one_based() {
        let menu = menu();
        assert_eq!(menu.len(), 3);
        assert_eq!(menu.option(1), Some(Action::Balance));
        assert_eq!(menu.option(3), Some(Action::Exit));
        assert_eq!(menu.option(0), None);
        assert_eq!(menu.option(4), None);
    }

    #[test]
    fn renders_numbered_options() {
        let text = menu().to_string();
        assert_eq!(
            text,
            format!(
                "\n{SEPARATOR}\nMain Menu\nAccount : alice\n\t1) Show Balance\n\t2) List Friends\n\t3) Exit\n"
            )
        );
    }

    #[test]
    fn line_selection_reprompts_until_valid() {
        let mut input = io::Cursor::new("abc\n9\n2\n");
        let mut out = Vec::new();
        let action = menu().choose_from(&mut input, &mut out).unwrap();
        assert_eq!(action, Action::Friends);

        let shown = String::from_utf8(out).unwrap();
        assert_eq!(shown.matches("1) Show Balance").count(), 3);
        assert!(shown.contains("Not a valid number."));
        assert!(shown.contains("Not a valid option."));
    }

    #[test]
    fn line_selection_fails_on_eof() {
        let mut out = Vec::new();
        let err = menu()
            .choose_from(&mut io::Cursor::new("0\n"), &mut out)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn title_skips_empty_header() {
        let menu: Menu<Action> = Menu::new("User Menu");
        assert!(menu.is_empty());
        assert_eq!(menu.title(), format!("\n{SEPARATOR}\nUser Menu"));
    }
}
