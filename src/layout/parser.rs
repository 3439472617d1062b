//! Type-layout listing parser.

use super::*;
use crate::core::ParseError;

/// Descriptor node the listing marks reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Root {
    pub ty: TypeId,
    pub thread_static: bool,
}

/// Parsed listing: the type table and the graph roots.
#[derive(Debug, Clone, Default)]
pub struct LayoutListing {
    pub table: TypeTable,
    pub roots: Vec<Root>,
}

#[derive(Debug)]
struct PendingRoot<'a> {
    line: usize,
    name: &'a str,
    thread_static: bool,
}

pub fn parse_listing(text: &str) -> Result<LayoutListing, ParseError> {
    let mut table = TypeTable::default();
    let mut pending_roots = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let content = raw.split(';').next().unwrap_or("");
        let mut tokens = content.split_whitespace();
        let Some(directive) = tokens.next() else {
            continue;
        };

        match directive {
            "target" => {
                let name = next_token(&mut tokens, line, "target needs an architecture")?;
                let target = name.parse::<TargetDetails>().map_err(|_| ParseError::UnknownTarget {
                    line,
                    name: name.to_string(),
                })?;
                table.set_target(target);
            }
            "type" => {
                let entry = parse_type(&mut tokens, line)?;
                let name = entry.name.clone();
                if table.add_type(entry).is_none() {
                    return Err(ParseError::DuplicateType { line, name });
                }
            }
            "root" => {
                let name = next_token(&mut tokens, line, "root needs a type name")?;
                let thread_static = match tokens.next() {
                    None | Some("static") => false,
                    Some("threadstatic") => true,
                    Some(other) => {
                        return Err(ParseError::Malformed {
                            line,
                            reason: format!("expected 'static' or 'threadstatic', found '{other}'"),
                        })
                    }
                };
                pending_roots.push(PendingRoot { line, name, thread_static });
            }
            other => {
                return Err(ParseError::UnknownDirective {
                    line,
                    directive: other.to_string(),
                })
            }
        }

        if let Some(extra) = tokens.next() {
            return Err(ParseError::Malformed {
                line,
                reason: format!("unexpected token '{extra}'"),
            });
        }
    }

    // Roots may name types defined further down.
    let roots = pending_roots
        .into_iter()
        .map(|root| {
            let ty = table.lookup(root.name).ok_or_else(|| ParseError::UnknownType {
                line: root.line,
                name: root.name.to_string(),
            })?;
            Ok(Root { ty, thread_static: root.thread_static })
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("Parsed layout listing: {} types, {} roots", table.len(), roots.len());
    Ok(LayoutListing { table, roots })
}

fn next_token<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
    reason: &str,
) -> Result<&'a str, ParseError> {
    tokens.next().ok_or_else(|| ParseError::Malformed {
        line,
        reason: reason.to_string(),
    })
}

fn parse_type<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<TypeEntry, ParseError> {
    let name = next_token(tokens, line, "type needs a name")?;
    let mut entry = TypeEntry {
        name: name.to_string(),
        canonical: false,
        statics: ReferenceBitmap::default(),
        thread_statics: ReferenceBitmap::default(),
    };

    for attr in tokens {
        if attr == "canonical" {
            entry.canonical = true;
        } else if let Some(map) = attr.strip_prefix("statics=") {
            entry.statics = parse_reference_map(map, line)?;
        } else if let Some(map) = attr.strip_prefix("threadstatics=") {
            entry.thread_statics = parse_reference_map(map, line)?;
        } else {
            return Err(ParseError::Malformed {
                line,
                reason: format!("unknown type attribute '{attr}'"),
            });
        }
    }

    Ok(entry)
}

fn parse_reference_map(map: &str, line: usize) -> Result<ReferenceBitmap, ParseError> {
    map.chars()
        .map(|slot| match slot {
            'R' => Ok(true),
            '.' => Ok(false),
            other => Err(ParseError::InvalidSlot { line, slot: other }),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(ReferenceBitmap::from_slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetArchitecture;

    #[test]
    fn test_parse_listing() {
        let listing = parse_listing(
            "; statics of a small program\n\
             target x86\n\
             root Program threadstatic\n\
             type Program statics=RR.R threadstatics=.R\n\
             type List<__Canon> statics=R ; shared\n\
             type Cache canonical\n\
             root Program\n",
        )
        .unwrap();

        let table = &listing.table;
        assert_eq!(table.target().architecture, TargetArchitecture::X86);
        assert_eq!(table.len(), 3);

        let program = table.lookup("Program").unwrap();
        assert_eq!(table.entry(program).statics.to_string(), "RR.R");
        assert_eq!(table.entry(program).thread_statics.to_string(), ".R");
        assert!(table.entry(table.lookup("Cache").unwrap()).canonical);
        assert!(table.entry(table.lookup("Cache").unwrap()).statics.is_empty());

        assert_eq!(
            listing.roots,
            vec![
                Root { ty: program, thread_static: true },
                Root { ty: program, thread_static: false },
            ]
        );
    }

    #[test]
    fn test_invalid_slot() {
        let err = parse_listing("type A statics=R.x").unwrap_err();
        assert_eq!(err, ParseError::InvalidSlot { line: 1, slot: 'x' });
    }

    #[test]
    fn test_unknown_root_type() {
        let err = parse_listing("type A\n\nroot B static\n").unwrap_err();
        assert_eq!(err, ParseError::UnknownType { line: 3, name: "B".to_string() });
    }

    #[test]
    fn test_duplicate_type_and_directive() {
        assert!(matches!(
            parse_listing("type A\ntype A\n"),
            Err(ParseError::DuplicateType { line: 2, .. })
        ));
        assert!(matches!(
            parse_listing("field A\n"),
            Err(ParseError::UnknownDirective { line: 1, .. })
        ));
        assert!(matches!(
            parse_listing("target sparc\n"),
            Err(ParseError::UnknownTarget { line: 1, .. })
        ));
        assert!(matches!(
            parse_listing("type A\nroot A static extra\n"),
            Err(ParseError::Malformed { line: 2, .. })
        ));
    }
}
