//! Substring Replacer (spec §4.H): turns a winning substring into a
//! synthesized procedure and rewrites every occurrence into a call.
//!
//! Scope note: alias repair (step 5) supports at most one `&x` /
//! derived-use pair per outlined substring. A substring exhibiting more than
//! one simultaneously is rejected with `Error::UnsupportedAlias` (spec
//! taxonomy item iii) rather than guessed at.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;

use crate::program::{Frame, Program};

use super::histogram::Winner;
use super::mangled::{self, TypeTag};

#[derive(Debug)]
pub enum Error {
    ShapeMismatch { expected: usize, found: usize },
    /// More than one alias pair in one substring (spec §7 taxonomy item
    /// iii). Carries both call-site expressions for the diagnostic.
    UnsupportedAlias {
        ref_expr: String,
        use_expr: String,
        other_ref_expr: String,
        other_use_expr: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ShapeMismatch { expected, found } => write!(
                f,
                "occurrences of the winning substring disagree on argument count: expected {expected}, found {found}"
            ),
            Error::UnsupportedAlias {
                ref_expr,
                use_expr,
                other_ref_expr,
                other_use_expr,
            } => write!(
                f,
                "substring has more than one alias pair, which is not supported: ({ref_expr}, {use_expr}) and ({other_ref_expr}, {other_use_expr})"
            ),
        }
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, Copy)]
pub struct Occurrence {
    pub frame_index: usize,
    pub start: usize,
}

/// Greedy left-to-right non-overlapping occurrences of `substring` within
/// each frame (spec §4.H step 0).
#[must_use]
pub fn find_occurrences(frames: &[Frame], substring: &[u16]) -> Vec<Occurrence> {
    let mut occurrences = Vec::new();
    if substring.is_empty() {
        return occurrences;
    }
    for (frame_index, frame) in frames.iter().enumerate() {
        let mut cursor = 0;
        while cursor + substring.len() <= frame.symbols.len() {
            if frame.symbols[cursor..cursor + substring.len()] == *substring {
                occurrences.push(Occurrence { frame_index, start: cursor });
                cursor += substring.len();
            } else {
                cursor += 1;
            }
        }
    }
    occurrences
}

/// A bare-identifier-shaped token that isn't an enum name: something that
/// names a value rather than spelling one out, and so must survive as a
/// parameter instead of folding to a shared literal.
#[must_use]
pub fn is_variable_reference(token: &str) -> bool {
    let (_, rest) = mangled::strip_operator(token);
    let name = rest.split('[').next().unwrap_or(rest);
    if name.starts_with("GL_") || name == "NULL" {
        return false;
    }
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.is_empty()
}

/// Whether a position can be folded straight into the synthesized body
/// instead of becoming a parameter: either it isn't a variable reference at
/// all (a literal, an enum name), or it is but names a process-lifetime
/// global every occurrence can reach directly (spec §4.H step 2, and the
/// "no repair needed" half of step 5's policy 1).
#[must_use]
pub fn is_foldable_constant(token: &str, known_globals: &HashSet<String>) -> bool {
    !is_variable_reference(token) || mangled::is_known_global(token, known_globals)
}

/// Whether `use_token` is the dereferenced/indexed form of `ref_token`
/// (spec §4.H step 5: `&x` at one position, `x` or `x[k]` at another).
#[must_use]
pub fn derived_use_matches(ref_token: &str, use_token: &str) -> bool {
    let Some(stripped) = ref_token.strip_prefix('&') else {
        return false;
    };
    let (_, use_name) = mangled::strip_operator(use_token);
    let base = use_name.split('[').next().unwrap_or(use_name);
    base == stripped
}

/// Maps a flat, per-occurrence parameter-list position back to the
/// instruction (offset within the substring) and argument index it came
/// from.
#[derive(Debug, Clone, Copy)]
pub struct FlatSlot {
    pub instr: usize,
    pub arg: usize,
}

fn flatten_occurrence(frame: &Frame, start: usize, len: usize) -> Vec<Vec<String>> {
    frame.args[start..start + len].to_vec()
}

fn flat_slots(shape: &[Vec<String>]) -> Vec<FlatSlot> {
    let mut slots = Vec::new();
    for (instr, args) in shape.iter().enumerate() {
        for arg in 0..args.len() {
            slots.push(FlatSlot { instr, arg });
        }
    }
    slots
}

enum AliasPolicy {
    None,
    /// Every occurrence shows the derived-use relationship: the use
    /// position is dropped entirely and rewritten as `*p_ref` in the body.
    AllAliased { ref_position: usize, use_position: usize },
    /// Only some occurrences show it: both positions stay as formals and a
    /// `memcpy` guards the ones that don't alias.
    Mixed { ref_position: usize, use_position: usize },
}

/// What a flattened position becomes inside the synthesized body.
enum Slot {
    Constant(String),
    Formal(String),
    /// Dereference of another formal (the all-aliased policy's use site).
    DerefFormal(String),
}

/// Outlines `winner` into a fresh procedure and rewrites every occurrence
/// into a call. Returns `Ok(false)` without mutating `program` if fewer than
/// two occurrences remain (nothing to share).
pub fn apply(
    program: &mut Program,
    winner: &Winner,
    known_globals: &HashSet<String>,
) -> Result<bool, Error> {
    let occurrences = find_occurrences(&program.frames, &winner.substring);
    if occurrences.len() < 2 {
        return Ok(false);
    }

    let len = winner.substring.len();
    let shape = flatten_occurrence(&program.frames[occurrences[0].frame_index], occurrences[0].start, len);
    let slots = flat_slots(&shape);

    let mut per_occurrence: Vec<Vec<String>> = Vec::with_capacity(occurrences.len());
    for occ in &occurrences {
        let args = flatten_occurrence(&program.frames[occ.frame_index], occ.start, len);
        let flat: Vec<String> = slots
            .iter()
            .map(|slot| {
                args.get(slot.instr)
                    .and_then(|instr_args| instr_args.get(slot.arg))
                    .cloned()
                    .ok_or(Error::ShapeMismatch {
                        expected: slots.len(),
                        found: args.iter().map(Vec::len).sum(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        per_occurrence.push(flat);
    }

    // Step 2/3: constant-fold positions identical (or foldable) across
    // every occurrence; everything else needs a formal parameter.
    let mut body_const: Vec<Option<String>> = vec![None; slots.len()];
    for (position, const_slot) in body_const.iter_mut().enumerate() {
        let first = &per_occurrence[0][position];
        let all_equal = per_occurrence.iter().all(|flat| &flat[position] == first);
        if all_equal && is_foldable_constant(first, known_globals) {
            *const_slot = Some(first.clone());
        }
    }

    let param_positions: Vec<usize> = (0..slots.len()).filter(|p| body_const[*p].is_none()).collect();

    // Step 3: coalesce positions that carry the same value as an earlier
    // surviving position at every occurrence — they share one formal
    // instead of each minting their own.
    let mut canonical_positions: Vec<usize> = Vec::new();
    let mut position_to_canonical: HashMap<usize, usize> = HashMap::new();
    for &position in &param_positions {
        let earlier = canonical_positions
            .iter()
            .copied()
            .find(|&candidate| per_occurrence.iter().all(|flat| flat[position] == flat[candidate]));
        match earlier {
            Some(candidate) => {
                position_to_canonical.insert(position, candidate);
            }
            None => {
                canonical_positions.push(position);
                position_to_canonical.insert(position, position);
            }
        }
    }

    // Step 5: find every alias pair the substring exhibits, then insist on
    // at most one (spec §7 taxonomy item iii covers the rest).
    let mut pairs: Vec<(usize, usize, bool)> = Vec::new();
    for &ref_position in &canonical_positions {
        let ref_token = &per_occurrence[0][ref_position];
        if !ref_token.starts_with('&') {
            continue;
        }
        for &use_position in &canonical_positions {
            if use_position == ref_position {
                continue;
            }
            let all_match = per_occurrence
                .iter()
                .all(|flat| derived_use_matches(&flat[ref_position], &flat[use_position]));
            let any_match = all_match
                || per_occurrence
                    .iter()
                    .any(|flat| derived_use_matches(&flat[ref_position], &flat[use_position]));
            if any_match {
                pairs.push((ref_position, use_position, all_match));
            }
        }
    }

    if pairs.len() > 1 {
        let (ref_a, use_a, _) = pairs[0];
        let (ref_b, use_b, _) = pairs[1];
        return Err(Error::UnsupportedAlias {
            ref_expr: per_occurrence[0][ref_a].clone(),
            use_expr: per_occurrence[0][use_a].clone(),
            other_ref_expr: per_occurrence[0][ref_b].clone(),
            other_use_expr: per_occurrence[0][use_b].clone(),
        });
    }

    let alias = match pairs.first() {
        Some(&(ref_position, use_position, true)) => AliasPolicy::AllAliased { ref_position, use_position },
        Some(&(ref_position, use_position, false)) => AliasPolicy::Mixed { ref_position, use_position },
        None => AliasPolicy::None,
    };

    // Per-occurrence record of whether the mixed policy's derived-use
    // relationship actually holds here (spec §4.H step 5 / §8 scenario 6):
    // the injected `memcpy` must be a no-op at every occurrence where it
    // doesn't, rather than copying unrelated data.
    let alias_matches: Vec<bool> = if let AliasPolicy::Mixed { ref_position, use_position } = alias {
        per_occurrence
            .iter()
            .map(|flat| derived_use_matches(&flat[ref_position], &flat[use_position]))
            .collect()
    } else {
        Vec::new()
    };

    // Step 4: name the surviving formals. The all-aliased use position is
    // dropped; everything else (including the mixed-policy use position,
    // which still varies sometimes) gets a name. Coalesced positions share
    // their canonical position's formal.
    let dropped_position = match alias {
        AliasPolicy::AllAliased { use_position, .. } => Some(use_position),
        _ => None,
    };

    let mut position_to_formal: HashMap<usize, String> = HashMap::new();
    for &position in &canonical_positions {
        if Some(position) == dropped_position {
            continue;
        }
        let sample = &per_occurrence[0][position];
        let tag = mangled::derive_type(sample);
        let name = mangled::formal_name(tag, position_to_formal.len());
        position_to_formal.insert(position, name);
    }
    let mut formal_names: Vec<String> = canonical_positions
        .iter()
        .filter(|p| Some(**p) != dropped_position)
        .map(|p| position_to_formal[p].clone())
        .collect();

    let size_formal = if matches!(alias, AliasPolicy::Mixed { .. }) {
        let name = mangled::formal_name(TypeTag::Int, formal_names.len());
        formal_names.push(name.clone());
        Some(name)
    } else {
        None
    };

    // Build the synthesized body: substitute constants, formals, or the
    // all-aliased use position's `*p_ref` rewrite per flattened slot.
    let mut body = Frame::new();
    let mut memcpy_inserted = false;
    for (instr, instr_args) in shape.iter().enumerate() {
        let mut rendered = Vec::with_capacity(instr_args.len());
        for arg_index in 0..instr_args.len() {
            let position = slots
                .iter()
                .position(|s| s.instr == instr && s.arg == arg_index)
                .expect("slot exists for every flattened position");
            let canonical = position_to_canonical.get(&position).copied().unwrap_or(position);
            let resolved = if let Some(constant) = &body_const[position] {
                Slot::Constant(constant.clone())
            } else if Some(canonical) == dropped_position {
                let AliasPolicy::AllAliased { ref_position, .. } = alias else {
                    unreachable!("dropped_position is only set for AllAliased");
                };
                Slot::DerefFormal(position_to_formal[&ref_position].clone())
            } else {
                Slot::Formal(position_to_formal[&canonical].clone())
            };
            rendered.push(match resolved {
                Slot::Constant(value) => value,
                Slot::Formal(name) => name,
                Slot::DerefFormal(name) => format!("(*{name})"),
            });
        }
        let code_unit = program.frames[occurrences[0].frame_index].symbols[occurrences[0].start + instr];
        body.push(code_unit, rendered);

        if let AliasPolicy::Mixed { ref_position, use_position } = alias {
            if slots[ref_position].instr == instr && !memcpy_inserted {
                let ref_name = position_to_formal[&ref_position].clone();
                let use_name = position_to_formal[&use_position].clone();
                let size_name = size_formal.clone().expect("mixed policy always carries a size formal");
                let line = format!("memcpy(&{use_name}, {ref_name}, {size_name});");
                let line_unit = program.alphabet.intern(&line);
                body.push(line_unit, vec![crate::program::SENTINEL_NON_CALL.to_string()]);
                memcpy_inserted = true;
            }
        }
    }

    // Name and register the synthesized procedure.
    let procedure_name = format!("subframe_{}", program.procedures.len());
    let code_unit = program.alphabet.intern(&procedure_name);
    program.formals.insert(code_unit, formal_names);
    program.procedures.insert(code_unit, body);

    // Step 1: rewrite every occurrence into a single call, back-to-front
    // per frame so earlier indices in that frame stay valid.
    let mut by_frame: HashMap<usize, Vec<usize>> = HashMap::new();
    for occ in &occurrences {
        by_frame.entry(occ.frame_index).or_default().push(occ.start);
    }

    for (frame_index, mut starts) in by_frame {
        starts.sort_unstable_by(|a, b| b.cmp(a));
        for start in starts {
            let occurrence_index = occurrences
                .iter()
                .position(|o| o.frame_index == frame_index && o.start == start)
                .expect("start came from this frame's occurrence list");
            let flat = &per_occurrence[occurrence_index];

            let mut call_args: Vec<String> = canonical_positions
                .iter()
                .filter(|p| Some(**p) != dropped_position)
                .map(|p| flat[*p].clone())
                .collect();
            if let Some(ref_position) = match alias {
                AliasPolicy::Mixed { ref_position, .. } => Some(ref_position),
                _ => None,
            } {
                let size_arg = if alias_matches[occurrence_index] {
                    format!("sizeof(*{})", flat[ref_position])
                } else {
                    "0".to_string()
                };
                call_args.push(size_arg);
            }
            if call_args.is_empty() {
                call_args.push(crate::program::VOID_ARG.to_string());
            }

            let frame = &mut program.frames[frame_index];
            frame.symbols.splice(start..start + len, std::iter::once(code_unit));
            frame.args.splice(start..start + 1, std::iter::once(call_args));
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_non_overlapping_occurrences_per_frame() {
        let mut frame = Frame::new();
        frame.push(1, vec!["a".into()]);
        frame.push(2, vec!["b".into()]);
        frame.push(1, vec!["a".into()]);
        frame.push(2, vec!["b".into()]);
        let occurrences = find_occurrences(std::slice::from_ref(&frame), &[1, 2]);
        assert_eq!(occurrences.len(), 2);
        assert_eq!(occurrences[0].start, 0);
        assert_eq!(occurrences[1].start, 2);
    }

    #[test]
    fn variable_reference_excludes_enum_names_and_literals() {
        assert!(is_variable_reference("myVar"));
        assert!(!is_variable_reference("GL_TRIANGLES"));
        assert!(!is_variable_reference("42"));
        assert!(!is_variable_reference("NULL"));
    }

    #[test]
    fn derived_use_detects_dereference_and_index() {
        assert!(derived_use_matches("&buf", "buf"));
        assert!(derived_use_matches("&buf", "buf[0]"));
        assert!(!derived_use_matches("&buf", "other"));
        assert!(!derived_use_matches("buf", "buf"));
    }

    #[test]
    fn too_few_occurrences_is_a_no_op() {
        let mut program = Program::new();
        program.begin_frame();
        program.frames[0].push(program.alphabet.intern("glClear"), vec!["0".into()]);
        let winner = Winner {
            substring: vec![program.alphabet.code_unit_of("glClear").unwrap()],
            count: 1,
            score: -1,
        };
        let applied = apply(&mut program, &winner, &HashSet::new()).unwrap();
        assert!(!applied);
    }

    fn push(program: &mut Program, frame: usize, name: &str, args: &[&str]) -> u16 {
        let unit = program.alphabet.intern(name);
        program.frames[frame].push(unit, args.iter().map(|a| a.to_string()).collect());
        unit
    }

    fn winner_of(program: &Program, names: &[&str]) -> Winner {
        let substring = names.iter().map(|n| program.alphabet.code_unit_of(n).unwrap()).collect::<Vec<_>>();
        Winner { substring, count: 2, score: 1 }
    }

    /// Spec §8 scenario 5: every occurrence shows the `&x` / derived-use
    /// relationship, so the use site is dropped and rewritten as `*p_ref`.
    #[test]
    fn all_aliased_substring_drops_the_use_site() {
        let mut program = Program::new();
        let f0 = program.begin_frame();
        push(&mut program, f0, "glGetIntegerv", &["GL_SOME_BINDING", "&b1"]);
        push(&mut program, f0, "glBindBuffer", &["GL_ARRAY_BUFFER", "b1"]);
        let f1 = program.begin_frame();
        push(&mut program, f1, "glGetIntegerv", &["GL_SOME_BINDING", "&b2"]);
        push(&mut program, f1, "glBindBuffer", &["GL_ARRAY_BUFFER", "b2"]);

        let winner = winner_of(&program, &["glGetIntegerv", "glBindBuffer"]);
        let applied = apply(&mut program, &winner, &HashSet::new()).unwrap();
        assert!(applied);

        assert_eq!(program.procedures.len(), 1);
        let (&unit, body) = program.procedures.iter().next().unwrap();
        let formals = &program.formals[&unit];
        assert_eq!(formals.len(), 1, "the use site must not become its own formal");

        let rendered: Vec<&str> = body.symbols.iter().map(|&u| program.alphabet.name(u)).collect();
        assert_eq!(rendered, vec!["glGetIntegerv", "glBindBuffer"]);
        assert_eq!(body.args[1][1], format!("(*{})", formals[0]));

        assert_eq!(program.frames[f0].args[0], vec!["&b1".to_string()]);
        assert_eq!(program.frames[f1].args[0], vec!["&b2".to_string()]);
    }

    /// Spec §8 scenario 6: only some occurrences show the derived-use
    /// relationship. The use site stays a formal, a `memcpy` bridges it, and
    /// every call site passes the real transfer size only where aliasing
    /// actually holds — the non-aliasing call site must pass 0 so the
    /// `memcpy` is a no-op there.
    #[test]
    fn mixed_aliased_substring_sizes_memcpy_per_call_site() {
        let mut program = Program::new();
        let f0 = program.begin_frame();
        push(&mut program, f0, "glGetIntegerv", &["GL_SOME_BINDING", "&b1"]);
        push(&mut program, f0, "glBindBuffer", &["GL_ARRAY_BUFFER", "b1"]);
        let f1 = program.begin_frame();
        push(&mut program, f1, "glGetIntegerv", &["GL_SOME_BINDING", "&b2"]);
        push(&mut program, f1, "glBindBuffer", &["GL_ARRAY_BUFFER", "other"]);

        let winner = winner_of(&program, &["glGetIntegerv", "glBindBuffer"]);
        let applied = apply(&mut program, &winner, &HashSet::new()).unwrap();
        assert!(applied);

        assert_eq!(program.procedures.len(), 1);
        let (&unit, body) = program.procedures.iter().next().unwrap();
        let formals = &program.formals[&unit];
        assert_eq!(formals.len(), 3, "ref, use, and the injected size formal");

        let memcpy_line = body
            .symbols
            .iter()
            .map(|&u| program.alphabet.name(u))
            .find(|text| text.starts_with("memcpy"))
            .expect("mixed policy injects a memcpy");
        assert!(memcpy_line.contains(&formals[0]));
        assert!(memcpy_line.contains(&formals[1]));
        assert!(memcpy_line.contains(&formals[2]));

        let aliasing_call = &program.frames[f0].args[0];
        let non_aliasing_call = &program.frames[f1].args[0];
        assert_eq!(aliasing_call[2], format!("sizeof(*{})", "&b1"));
        assert_eq!(non_aliasing_call[2], "0");
    }

    /// Spec §4.H step 3: two positions that always carry the same value
    /// share one formal instead of each minting their own.
    #[test]
    fn coalesces_positions_sharing_a_value_across_occurrences() {
        let mut program = Program::new();
        let f0 = program.begin_frame();
        push(&mut program, f0, "glBindTexture", &["GL_TEXTURE_2D", "t1"]);
        push(&mut program, f0, "glActiveTexture", &["t1"]);
        let f1 = program.begin_frame();
        push(&mut program, f1, "glBindTexture", &["GL_TEXTURE_2D", "t2"]);
        push(&mut program, f1, "glActiveTexture", &["t2"]);

        let winner = winner_of(&program, &["glBindTexture", "glActiveTexture"]);
        let applied = apply(&mut program, &winner, &HashSet::new()).unwrap();
        assert!(applied);

        let (&unit, body) = program.procedures.iter().next().unwrap();
        let formals = &program.formals[&unit];
        assert_eq!(formals.len(), 1, "both positions always agree and must share a formal");
        assert_eq!(body.args[0][1], formals[0]);
        assert_eq!(body.args[1][0], formals[0]);
        assert_eq!(program.frames[f0].args[0], vec!["t1".to_string()]);
    }
}
