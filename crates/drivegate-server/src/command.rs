//! Control-channel command parsing.

use chrono::NaiveDateTime;
use std::str::FromStr;
use strum::EnumString;
use thiserror::Error;

/// Command verbs, including the `X` aliases some clients still send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, strum::Display)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Verb {
    User,
    Pass,
    Quit,
    Noop,
    Syst,
    Type,
    #[strum(to_string = "PWD", serialize = "XPWD")]
    Pwd,
    #[strum(to_string = "CWD", serialize = "XCWD")]
    Cwd,
    #[strum(to_string = "CDUP", serialize = "XCUP")]
    Cdup,
    List,
    Nlst,
    #[strum(to_string = "MKD", serialize = "XMKD")]
    Mkd,
    #[strum(to_string = "RMD", serialize = "XRMD")]
    Rmd,
    Dele,
    Rnfr,
    Rnto,
    Pasv,
    Epsv,
    Retr,
    Stor,
    Appe,
    Size,
    Mfmt,
    Feat,
    Opts,
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    User(String),
    Pass(String),
    Quit,
    Noop,
    Syst,
    Type(String),
    Pwd,
    Cwd(String),
    Cdup,
    List(String),
    Nlst(String),
    Mkd(String),
    Rmd(String),
    Dele(String),
    Rnfr(String),
    Rnto(String),
    Pasv,
    Epsv,
    Retr(String),
    Stor(String),
    Appe(String),
    Size(String),
    Mfmt { mtime: NaiveDateTime, path: String },
    Feat,
    Opts(String),
}

/// Why a line could not be turned into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("{0} requires an argument")]
    MissingArgument(Verb),
    #[error("bad argument to {0}")]
    BadArgument(Verb),
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (verb, arg) = match line.split_once(' ') {
            Some((verb, arg)) => (verb, arg),
            None => (line, ""),
        };
        let verb = Verb::from_str(verb.trim()).map_err(|_| ParseError::Unknown(verb.to_string()))?;

        // Paths may contain spaces; only the separator after the verb is eaten.
        let required = || {
            if arg.is_empty() {
                Err(ParseError::MissingArgument(verb))
            } else {
                Ok(arg.to_string())
            }
        };

        Ok(match verb {
            Verb::User => Command::User(required()?),
            // An empty password is legal.
            Verb::Pass => Command::Pass(arg.to_string()),
            Verb::Quit => Command::Quit,
            Verb::Noop => Command::Noop,
            Verb::Syst => Command::Syst,
            Verb::Type => Command::Type(required()?),
            Verb::Pwd => Command::Pwd,
            Verb::Cwd => Command::Cwd(required()?),
            Verb::Cdup => Command::Cdup,
            Verb::List => Command::List(strip_list_flags(arg).to_string()),
            Verb::Nlst => Command::Nlst(strip_list_flags(arg).to_string()),
            Verb::Mkd => Command::Mkd(required()?),
            Verb::Rmd => Command::Rmd(required()?),
            Verb::Dele => Command::Dele(required()?),
            Verb::Rnfr => Command::Rnfr(required()?),
            Verb::Rnto => Command::Rnto(required()?),
            Verb::Pasv => Command::Pasv,
            Verb::Epsv => Command::Epsv,
            Verb::Retr => Command::Retr(required()?),
            Verb::Stor => Command::Stor(required()?),
            Verb::Appe => Command::Appe(required()?),
            Verb::Size => Command::Size(required()?),
            Verb::Mfmt => {
                let arg = required()?;
                let (stamp, path) = arg
                    .split_once(' ')
                    .ok_or(ParseError::MissingArgument(verb))?;
                let mtime = NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S")
                    .map_err(|_| ParseError::BadArgument(verb))?;
                Command::Mfmt {
                    mtime,
                    path: path.to_string(),
                }
            }
            Verb::Feat => Command::Feat,
            Verb::Opts => Command::Opts(required()?),
        })
    }
}

/// Drop `ls`-style flags (`-la`) that clients put before the path.
fn strip_list_flags(arg: &str) -> &str {
    let mut rest = arg.trim();
    while rest.starts_with('-') {
        rest = match rest.split_once(' ') {
            Some((_, tail)) => tail.trim_start(),
            None => "",
        };
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Command, ParseError> {
        s.parse()
    }

    #[test]
    fn verbs_are_case_insensitive_with_aliases() {
        assert_eq!(parse("user bob\r\n").unwrap(), Command::User("bob".into()));
        assert_eq!(parse("XPWD").unwrap(), Command::Pwd);
        assert_eq!(parse("xcwd /D/data").unwrap(), Command::Cwd("/D/data".into()));
        assert_eq!(parse("CDUP").unwrap(), Command::Cdup);
        assert_eq!(parse("XMKD new").unwrap(), Command::Mkd("new".into()));
    }

    #[test]
    fn arguments_keep_their_spaces() {
        assert_eq!(
            parse("RETR My Documents/a b.txt").unwrap(),
            Command::Retr("My Documents/a b.txt".into())
        );
        assert_eq!(parse("PASS ").unwrap(), Command::Pass(String::new()));
    }

    #[test]
    fn list_flags_are_dropped() {
        assert_eq!(parse("LIST -la").unwrap(), Command::List(String::new()));
        assert_eq!(parse("LIST -a /C").unwrap(), Command::List("/C".into()));
        assert_eq!(parse("NLST").unwrap(), Command::Nlst(String::new()));
    }

    #[test]
    fn errors() {
        assert_eq!(parse("HELO x"), Err(ParseError::Unknown("HELO".into())));
        assert_eq!(parse("CWD"), Err(ParseError::MissingArgument(Verb::Cwd)));
        assert_eq!(parse("MFMT nope x"), Err(ParseError::BadArgument(Verb::Mfmt)));
    }

    #[test]
    fn mfmt_timestamp() {
        let Command::Mfmt { mtime, path } = parse("MFMT 20240102030405 f.txt").unwrap() else {
            panic!("expected MFMT");
        };
        assert_eq!(path, "f.txt");
        assert_eq!(mtime.to_string(), "2024-01-02 03:04:05");
    }
}
