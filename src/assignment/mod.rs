//! Token assignment enumerator (component 4, `spec.md` §4.5): walks the
//! token graph and yields every admissible assignment of token types to
//! term positions, with the transition penalties between types.
//!
//! The traversal is driven by an explicit work-stack rather than
//! recursion, mirroring the design note that recursion depth would
//! otherwise track query length.

use crate::cnf;
use crate::query::{BreakType, QueryStruct, TokenRange, TokenType};

/// A token range tagged with the type it was assigned.
#[derive(Debug, Clone, Copy)]
pub struct TypedRange {
	pub ttype: TokenType,
	pub trange: TokenRange,
}

/// One admissible reading of the query: which range plays which role.
#[derive(Debug, Clone, Default)]
pub struct TokenAssignment {
	pub penalty: f64,
	pub name: Option<TokenRange>,
	pub address: Vec<TokenRange>,
	pub housenumber: Option<TokenRange>,
	pub postcode: Option<TokenRange>,
	pub country: Option<TokenRange>,
	pub near_item: Option<TokenRange>,
	pub qualifier: Option<TokenRange>,
}

impl TokenAssignment {
	fn from_ranges(ranges: &[TypedRange]) -> Self {
		let mut out = TokenAssignment::default();
		for tr in ranges {
			match tr.ttype {
				TokenType::Partial => out.address.push(tr.trange),
				TokenType::Housenumber => out.housenumber = Some(tr.trange),
				TokenType::Postcode => out.postcode = Some(tr.trange),
				TokenType::Country => out.country = Some(tr.trange),
				TokenType::NearItem => out.near_item = Some(tr.trange),
				TokenType::Qualifier => out.qualifier = Some(tr.trange),
				TokenType::Word => {}
			}
		}
		out
	}

	fn with_penalty(&self, penalty: f64) -> Self {
		Self {
			penalty,
			..self.clone()
		}
	}
}

/// Working state for one partial traversal of the token graph.
#[derive(Debug, Clone)]
struct SequenceState {
	seq: Vec<TypedRange>,
	direction: i8,
	penalty: f64,
}

impl SequenceState {
	fn new(direction: i8) -> Self {
		Self {
			seq: Vec::new(),
			direction,
			penalty: 0.0,
		}
	}

	fn end_pos(&self) -> usize {
		self.seq.last().map(|r| r.trange.end).unwrap_or(0)
	}

	fn has_types(&self, ttypes: &[TokenType]) -> bool {
		self.seq.iter().any(|s| ttypes.contains(&s.ttype))
	}

	fn is_final(&self) -> bool {
		self.seq.len() > 1 && matches!(self.seq.last().unwrap().ttype, TokenType::Country | TokenType::NearItem)
	}

	/// Whether `ttype` can extend this sequence, and the resulting
	/// direction if so (`spec.md` §4.5 step 3 grammar table).
	fn appendable(&self, ttype: TokenType) -> Option<i8> {
		if ttype == TokenType::Word {
			return None;
		}

		if self.seq.is_empty() {
			return Some(match ttype {
				TokenType::Country => -1,
				TokenType::Housenumber | TokenType::Qualifier => 1,
				_ => self.direction,
			});
		}

		if ttype == TokenType::Partial {
			if self.direction == -1 && self.seq[..self.seq.len() - 1].iter().any(|t| t.ttype == TokenType::Qualifier) {
				return None;
			}
			return Some(self.direction);
		}

		if self.has_types(&[ttype]) {
			return None;
		}

		match ttype {
			TokenType::Housenumber => {
				if self.direction == 1 {
					if self.seq.len() == 1 && self.seq[0].ttype == TokenType::Qualifier {
						return None;
					}
					if self.seq.len() > 2 || self.has_types(&[TokenType::Postcode, TokenType::Country]) {
						return None;
					}
				} else if self.direction == -1 || self.has_types(&[TokenType::Postcode, TokenType::Country]) {
					return Some(-1);
				}
				Some(self.direction)
			}
			TokenType::Postcode => {
				if self.direction == -1 {
					if self.has_types(&[TokenType::Housenumber, TokenType::Qualifier]) {
						return None;
					}
					return Some(-1);
				}
				if self.direction == 1 {
					return if self.has_types(&[TokenType::Country]) {
						None
					} else {
						Some(1)
					};
				}
				if self.has_types(&[TokenType::Housenumber, TokenType::Qualifier]) {
					return Some(1);
				}
				Some(self.direction)
			}
			TokenType::Country => {
				if self.direction == -1 {
					None
				} else {
					Some(1)
				}
			}
			TokenType::NearItem => Some(self.direction),
			TokenType::Qualifier => {
				if self.direction == 1 {
					let ok = (self.seq.len() == 1 && matches!(self.seq[0].ttype, TokenType::Partial | TokenType::NearItem))
						|| (self.seq.len() == 2 && self.seq[0].ttype == TokenType::NearItem && self.seq[1].ttype == TokenType::Partial);
					return if ok {
						Some(1)
					} else {
						None
					};
				}
				if self.direction == -1 {
					return Some(-1);
				}
				let tempseq: &[TypedRange] = if self.seq[0].ttype == TokenType::NearItem {
					&self.seq[1..]
				} else {
					&self.seq[..]
				};
				if tempseq.is_empty() {
					return Some(1);
				}
				if tempseq.len() == 1 && self.seq[0].ttype == TokenType::Housenumber {
					return None;
				}
				if tempseq.len() > 1 || self.has_types(&[TokenType::Postcode, TokenType::Country]) {
					return Some(-1);
				}
				Some(0)
			}
			_ => None,
		}
	}

	fn advance(&self, ttype: TokenType, end_pos: usize, force_break: bool, break_penalty: f64) -> Option<SequenceState> {
		let newdir = self.appendable(ttype)?;

		let (newseq, new_penalty) = if self.seq.is_empty() {
			(
				vec![TypedRange {
					ttype,
					trange: TokenRange::new(0, end_pos),
				}],
				0.0,
			)
		} else {
			let last = *self.seq.last().unwrap();
			if !force_break && last.ttype == ttype {
				let mut seq = self.seq.clone();
				let i = seq.len() - 1;
				seq[i] = TypedRange {
					ttype,
					trange: last.trange.replace_end(end_pos),
				};
				(seq, 0.0)
			} else {
				let mut seq = self.seq.clone();
				seq.push(TypedRange {
					ttype,
					trange: TokenRange::new(last.trange.end, end_pos),
				});
				(seq, break_penalty)
			}
		};

		Some(SequenceState {
			seq: newseq,
			direction: newdir,
			penalty: self.penalty + new_penalty,
		})
	}

	fn adapt_penalty_from_priors(&mut self, priors: usize, new_dir: i8) -> bool {
		if priors >= 2 {
			if self.direction == 0 {
				self.direction = new_dir;
			} else if priors == 2 {
				self.penalty += 0.8;
			} else {
				return false;
			}
		}
		true
	}

	/// Forward-context checks that can only be made once the sequence is
	/// complete (`spec.md` §4.5 step 4).
	fn recheck_sequence(&mut self) -> bool {
		let hnrpos = self.seq.iter().position(|tr| tr.ttype == TokenType::Housenumber);
		if let Some(hnrpos) = hnrpos {
			if self.direction != -1 {
				let priors = self.seq[..hnrpos].iter().filter(|t| t.ttype == TokenType::Partial).count();
				if !self.adapt_penalty_from_priors(priors, -1) {
					return false;
				}
			}
			if self.direction != 1 {
				let priors = self.seq[hnrpos + 1..].iter().filter(|t| t.ttype == TokenType::Partial).count();
				if !self.adapt_penalty_from_priors(priors, 1) {
					return false;
				}
			}
			if self.seq.iter().any(|t| t.ttype == TokenType::NearItem) {
				self.penalty += 1.0;
			}
		}
		true
	}

	fn assignments_postcode(&self, base: &TokenAssignment, query_len: usize, out: &mut Vec<TokenAssignment>) {
		let postcode = base.postcode.expect("assignments_postcode requires a postcode range");
		if (postcode.start == 0 && self.direction != -1) || (postcode.end == query_len && self.direction != 1) {
			let mut penalty = if postcode.start == 0 {
				self.penalty
			} else {
				self.penalty + 0.1
			};
			penalty += 0.1 * base.address.len().saturating_sub(1) as f64;
			out.push(base.with_penalty(penalty));
		}
	}

	fn assignments_address_forward(&self, base: &TokenAssignment, query: &QueryStruct, out: &mut Vec<TokenAssignment>) {
		let first = base.address[0];

		if let Some(postcode) = base.postcode {
			if postcode < first {
				return;
			}
		}

		let mut penalty = self.penalty;
		if base.country.is_none() && self.direction == 1 && query.dir_penalty > 0.0 {
			penalty += query.dir_penalty;
		}

		out.push(TokenAssignment {
			penalty,
			name: Some(first),
			address: base.address[1..].to_vec(),
			..base.clone()
		});

		let housenumber_after = base.housenumber.map(|h| first.end < h.start).unwrap_or(false);
		let qualifier_after_first = base.qualifier.map(|q| q > first).unwrap_or(false);
		if housenumber_after || qualifier_after_first || !query.nodes[first.start].ptype.is_any() {
			return;
		}

		let housenumber_before = base.housenumber.map(|h| h > first).unwrap_or(false);
		if housenumber_before || query.source.len() > 1 {
			penalty += 0.25;
		}
		if self.direction == 0 && query.dir_penalty > 0.0 {
			penalty += query.dir_penalty;
		}

		for i in (first.start + 1)..first.end {
			let (name, addr) = first.split(i);
			let mut address = vec![addr];
			address.extend_from_slice(&base.address[1..]);
			out.push(TokenAssignment {
				name: Some(name),
				address,
				penalty: penalty + query.nodes[i].word_break_penalty(),
				..base.clone()
			});
		}
	}

	fn assignments_address_backward(&self, base: &TokenAssignment, query: &QueryStruct, out: &mut Vec<TokenAssignment>) {
		let last = *base.address.last().unwrap();

		if let Some(postcode) = base.postcode {
			if postcode > last {
				return;
			}
		}

		let mut penalty = self.penalty;
		if base.country.is_none() && self.direction == -1 && query.dir_penalty < 0.0 {
			penalty -= query.dir_penalty;
		}

		if self.direction == -1 || base.address.len() > 1 || base.postcode.is_some() {
			out.push(TokenAssignment {
				penalty,
				name: Some(last),
				address: base.address[..base.address.len() - 1].to_vec(),
				..base.clone()
			});
		}

		let housenumber_before = base.housenumber.map(|h| last.start > h.end).unwrap_or(false);
		let qualifier_before_last = base.qualifier.map(|q| q < last).unwrap_or(false);
		if housenumber_before || qualifier_before_last || !query.nodes[last.start].ptype.is_any() {
			return;
		}

		let housenumber_after = base.housenumber.map(|h| h < last).unwrap_or(false);
		if housenumber_after {
			penalty += 0.4;
		}
		if query.source.len() > 1 {
			penalty += 0.25;
		}
		if self.direction == 0 && query.dir_penalty < 0.0 {
			penalty -= query.dir_penalty;
		}

		for i in (last.start + 1)..last.end {
			let (addr, name) = last.split(i);
			let mut address = base.address[..base.address.len() - 1].to_vec();
			address.push(addr);
			out.push(TokenAssignment {
				name: Some(name),
				address,
				penalty: penalty + query.nodes[i].word_break_penalty(),
				..base.clone()
			});
		}
	}

	fn get_assignments(&self, query: &QueryStruct, out: &mut Vec<TokenAssignment>) {
		let base = TokenAssignment::from_ranges(&self.seq);

		let num_addr_tokens: usize = base.address.iter().map(|t| t.len()).sum();
		if num_addr_tokens > cnf::MAX_ADDRESS_TOKENS {
			return;
		}

		if base.postcode.is_some() && !base.address.is_empty() {
			self.assignments_postcode(&base, query.num_token_slots(), out);
		}

		if base.address.is_empty() {
			if base.housenumber.is_none() && (base.postcode.is_some() || base.country.is_some() || base.near_item.is_some()) {
				out.push(base.with_penalty(self.penalty));
			}
			return;
		}

		let mut state = self.clone();
		if base.postcode.map(|p| p.start == 0).unwrap_or(false) {
			state.penalty += 0.1;
		}

		if state.direction != -1 {
			state.assignments_address_forward(&base, query, out);
		}
		if state.direction != 1 {
			state.assignments_address_backward(&base, query, out);
		}

		if base.housenumber.is_some() && base.qualifier.is_none() {
			out.push(base.with_penalty(state.penalty));
		}
	}
}

/// Enumerate every admissible token assignment for the query, driven by
/// an explicit work-stack instead of recursion.
pub fn yield_token_assignments(query: &QueryStruct) -> Vec<TokenAssignment> {
	let mut out = Vec::new();
	if query.source.is_empty() {
		return out;
	}

	let initial_dir = if query.source[0].ptype.is_any() {
		0
	} else {
		1
	};
	let mut todo = vec![SequenceState::new(initial_dir)];

	while let Some(state) = todo.pop() {
		let node = &query.nodes[state.end_pos()];

		for tlist in &node.starting {
			let next = state.advance(tlist.ttype, tlist.range.end, true, node.word_break_penalty());
			append_state(query, &mut todo, &mut out, next);
		}

		if node.partial_tokens().is_some() {
			let next = state.advance(TokenType::Partial, state.end_pos() + 1, node.btype == Some(BreakType::Phrase), node.word_break_penalty());
			append_state(query, &mut todo, &mut out, next);
		}
	}

	out
}

fn append_state(query: &QueryStruct, todo: &mut Vec<SequenceState>, out: &mut Vec<TokenAssignment>, newstate: Option<SequenceState>) {
	let Some(mut newstate) = newstate else {
		return;
	};
	if newstate.end_pos() == query.num_token_slots() {
		if newstate.recheck_sequence() {
			newstate.get_assignments(query, out);
		}
	} else if !newstate.is_final() {
		todo.push(newstate);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::query::{Phrase, PhraseType, Token, TokenType};

	fn push_token(query: &mut QueryStruct, start: usize, end: usize, ttype: TokenType) {
		query.add_token(
			TokenRange::new(start, end),
			ttype,
			Token {
				token: 1,
				lookup_word: "x".into(),
				word_token: "x".into(),
				ttype,
				penalty: 0.0,
				count: 1,
				addr_count: 1,
				info: None,
			},
		);
	}

	#[test]
	fn single_partial_term_yields_a_name_only_assignment() {
		let mut query = QueryStruct::new(vec![Phrase::new("berlin", PhraseType::Any)]);
		query.add_node(BreakType::End, PhraseType::Any);
		push_token(&mut query, 0, 1, TokenType::Partial);

		let assignments = yield_token_assignments(&query);
		assert!(!assignments.is_empty());
		assert!(assignments.iter().any(|a| a.name == Some(TokenRange::new(0, 1))));
	}

	#[test]
	fn postcode_only_query_is_a_postcode_search() {
		let mut query = QueryStruct::new(vec![Phrase::new("12345", PhraseType::Any)]);
		query.add_node(BreakType::End, PhraseType::Any);
		push_token(&mut query, 0, 1, TokenType::Postcode);

		let assignments = yield_token_assignments(&query);
		assert!(assignments.iter().any(|a| a.postcode == Some(TokenRange::new(0, 1)) && a.address.is_empty()));
	}
}
