//! Metropolis Monte Carlo over type hierarchies.
//!
//! Each step removes a rule or refines one with a decorator, retypes the
//! corpus, and accepts or rejects the new hierarchy based on how well its
//! typing agrees with the reference.

use std::fmt::{Display, Formatter, Result as FmtResult};

use rand::{rngs::StdRng, Rng};
use thiserror::Error;
use tracing::*;

use crate::{
    AtomTyper, Corpus, Decorator, Label, LabelMap, MatchReport, PatternMatcher, ReferenceScorer,
    ReplacementBinding, Rule, RuleList, ScoreError, TypeStatistics, TypingError,
};

/// Why a sampler could not be built.
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("No base types were given")]
    EmptyRules,
    #[error("No molecules were given")]
    EmptyCorpus,
    #[error("Base types do not type every atom: {0}")]
    Typing(#[from] TypingError),
    #[error("Reference types do not fit the molecules: {0}")]
    Reference(#[from] ScoreError),
}

/// Why a proposal was thrown out before the acceptance test.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProposalError {
    #[error("typing failed: {0}")]
    Coverage(TypingError),
    #[error("type '{0}' already exists")]
    DuplicateLabel(Label),
    #[error("pattern '{0}' already exists")]
    DuplicatePattern(String),
    #[error("new type '{0}' types no atoms")]
    UnusedType(Label),
    #[error("parent type '{0}' no longer types any atoms")]
    StarvedParent(Label),
    #[error("bad pattern: {0}")]
    Pattern(String),
    #[error("no decorators to refine with")]
    NoDecorators,
    #[error("scoring failed: {0}")]
    Score(ScoreError),
}

impl From<TypingError> for ProposalError {
    fn from(error: TypingError) -> Self {
        match error {
            TypingError::Coverage { .. } => ProposalError::Coverage(error),
            TypingError::Pattern { .. } => ProposalError::Pattern(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub temperature: f64,
    /// Log the verdict and type table of every iteration at `info`.
    pub verbose: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            verbose: false,
        }
    }
}

impl SamplerConfig {
    /// The scale of score differences: atoms times temperature, or 1 at zero
    /// temperature.
    pub fn effective_temperature(&self, total_atoms: usize) -> f64 {
        if self.temperature == 0.0 {
            1.0
        } else {
            total_atoms as f64 * self.temperature
        }
    }
}

/// A hierarchy together with the typing it produces and its score.
/// Replaced as a whole when a proposal is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerState {
    pub rules: RuleList,
    pub labels: LabelMap,
    /// `None` without a reference.
    pub matches: Option<MatchReport>,
    pub total_matched: usize,
    pub total_atoms: usize,
    pub temperature: f64,
}

impl SamplerState {
    pub fn statistics(&self) -> TypeStatistics {
        TypeStatistics::compute(&self.rules, &self.labels)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Move {
    Destroy { label: Label },
    Refine { parent: Label, decorator: Option<Decorator> },
}

impl Display for Move {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Move::Destroy { label } => write!(f, "destroy '{label}'"),
            Move::Refine {
                parent,
                decorator: Some(decorator),
            } => write!(f, "refine '{parent}' with '{}'", decorator.name),
            Move::Refine { parent, .. } => write!(f, "refine '{parent}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted,
    /// Valid, but lost the Metropolis test.
    Rejected,
    Invalid(ProposalError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub proposal: Move,
    pub verdict: Verdict,
    /// Proposed minus current matched atoms, for valid proposals.
    pub delta: Option<i64>,
}

/// Counters over a sampler's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub iterations: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub invalid: usize,
    pub destroy_proposals: usize,
    pub refine_proposals: usize,
}

impl RunStatistics {
    fn record(&mut self, outcome: &StepOutcome) {
        self.iterations += 1;
        match outcome.proposal {
            Move::Destroy { .. } => self.destroy_proposals += 1,
            Move::Refine { .. } => self.refine_proposals += 1,
        }
        match outcome.verdict {
            Verdict::Accepted => self.accepted += 1,
            Verdict::Rejected => self.rejected += 1,
            Verdict::Invalid(_) => self.invalid += 1,
        }
    }
}

impl Display for RunStatistics {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "{} iterations: {} accepted, {} rejected, {} invalid ({} destroy, {} refine proposals)",
            self.iterations,
            self.accepted,
            self.rejected,
            self.invalid,
            self.destroy_proposals,
            self.refine_proposals
        )
    }
}

/// Accept a score change of `delta` at the given effective temperature.
///
/// Gains are always accepted; losses with probability `exp(delta / T)`.
pub fn metropolis_accept<R: Rng + ?Sized>(
    delta: f64,
    effective_temperature: f64,
    rng: &mut R,
) -> bool {
    let log_p_accept = delta / effective_temperature;
    log_p_accept > 0.0 || rng.gen::<f64>() < log_p_accept.exp()
}

pub struct HierarchySampler<'a, M, R = StdRng> {
    corpus: &'a Corpus,
    matcher: &'a M,
    decorators: Vec<Decorator>,
    bindings: Vec<ReplacementBinding>,
    scorer: Option<ReferenceScorer>,
    config: SamplerConfig,
    rng: R,
    state: SamplerState,
    statistics: RunStatistics,
}

impl<'a, M: PatternMatcher, R: Rng> HierarchySampler<'a, M, R> {
    /// Start from `base_rules`, which must type every atom of the corpus.
    pub fn new(
        corpus: &'a Corpus,
        matcher: &'a M,
        base_rules: RuleList,
        decorators: Vec<Decorator>,
        bindings: Vec<ReplacementBinding>,
        config: SamplerConfig,
        rng: R,
    ) -> Result<Self, SamplerError> {
        if base_rules.is_empty() {
            return Err(SamplerError::EmptyRules);
        }
        if corpus.is_empty() {
            return Err(SamplerError::EmptyCorpus);
        }

        let labels = AtomTyper::new(&base_rules, &bindings).assign(corpus, matcher)?;
        let state = SamplerState {
            rules: base_rules,
            labels,
            matches: None,
            total_matched: 0,
            total_atoms: corpus.atom_count(),
            temperature: config.temperature,
        };
        info!(
            "Sampler starts with {} types, {} decorators and {} atoms in {} molecules",
            state.rules.len(),
            decorators.len(),
            state.total_atoms,
            corpus.len()
        );
        debug!("\n{}", state.statistics().render(None));

        Ok(Self {
            corpus,
            matcher,
            decorators,
            bindings,
            scorer: None,
            config,
            rng,
            state,
            statistics: RunStatistics::default(),
        })
    }

    /// Score hierarchies against `reference` from now on.
    pub fn with_reference(mut self, reference: LabelMap) -> Result<Self, SamplerError> {
        let scorer = ReferenceScorer::new(reference);
        let report = scorer.score(&self.state.labels)?;
        info!(
            "Base types match {} of {} atoms of {} reference types",
            report.total_matched,
            report.total_atoms,
            scorer.reference_types().len()
        );
        self.state.total_matched = report.total_matched;
        self.state.matches = Some(report);
        self.scorer = Some(scorer);
        Ok(self)
    }

    pub fn state(&self) -> &SamplerState {
        &self.state
    }

    pub fn rules(&self) -> &RuleList {
        &self.state.rules
    }

    pub fn statistics(&self) -> &RunStatistics {
        &self.statistics
    }

    pub fn into_state(self) -> SamplerState {
        self.state
    }

    /// Propose one move and accept or reject it.
    pub fn step(&mut self) -> StepOutcome {
        let (proposal, candidate) = if self.rng.gen_bool(0.5) {
            self.propose_destroy()
        } else {
            self.propose_refine()
        };
        self.decide(proposal, candidate)
    }

    /// Apply the Metropolis test to a proposal. The current state only
    /// changes when the candidate is valid and accepted.
    fn decide(
        &mut self,
        proposal: Move,
        candidate: Result<SamplerState, ProposalError>,
    ) -> StepOutcome {
        debug!("Proposal: {}", proposal);

        let candidate = match candidate {
            Ok(candidate) => candidate,
            Err(error) => {
                debug!("Invalid proposal: {}", error);
                return StepOutcome {
                    proposal,
                    verdict: Verdict::Invalid(error),
                    delta: None,
                };
            }
        };

        let delta = candidate.total_matched as i64 - self.state.total_matched as i64;
        let effective_temperature = self.config.effective_temperature(self.state.total_atoms);
        let verdict = if metropolis_accept(delta as f64, effective_temperature, &mut self.rng) {
            self.state = candidate;
            Verdict::Accepted
        } else {
            Verdict::Rejected
        };
        debug!("Score change {} at temperature {}: {:?}", delta, effective_temperature, verdict);

        StepOutcome {
            proposal,
            verdict,
            delta: Some(delta),
        }
    }

    /// Run `iterations` steps and return the counters for the whole life of
    /// the sampler.
    pub fn run(&mut self, iterations: usize) -> &RunStatistics {
        for iteration in 0..iterations {
            let outcome = self.step();
            self.statistics.record(&outcome);

            let table = self.state.statistics().render(self.state.matches.as_ref());
            if self.config.verbose {
                info!(
                    "Iteration {} / {}: {} {}",
                    iteration + 1,
                    iterations,
                    outcome.proposal,
                    verdict_word(&outcome.verdict)
                );
                info!("\n{}", table);
            } else {
                debug!(
                    "Iteration {} / {}: {} {}",
                    iteration + 1,
                    iterations,
                    outcome.proposal,
                    verdict_word(&outcome.verdict)
                );
                trace!("\n{}", table);
            }
        }
        info!("{}", self.statistics);
        &self.statistics
    }

    fn propose_destroy(&mut self) -> (Move, Result<SamplerState, ProposalError>) {
        let index = self.rng.gen_range(0..self.state.rules.len());
        self.propose_destroy_at(index)
    }

    fn propose_destroy_at(&self, index: usize) -> (Move, Result<SamplerState, ProposalError>) {
        let proposal = Move::Destroy {
            label: self.rule_label(index),
        };
        if index >= self.state.rules.len() {
            return (proposal, Err(ProposalError::Pattern(format!("no rule at {index}"))));
        }
        let mut rules = self.state.rules.clone();
        let removed = rules.remove(index);
        debug!("Attempting to destroy type {} : {}", removed.pattern, removed.label);
        (proposal, self.evaluate(rules))
    }

    fn propose_refine(&mut self) -> (Move, Result<SamplerState, ProposalError>) {
        let parent = self.rng.gen_range(0..self.state.rules.len());
        if self.decorators.is_empty() {
            let proposal = Move::Refine {
                parent: self.rule_label(parent),
                decorator: None,
            };
            return (proposal, Err(ProposalError::NoDecorators));
        }
        let decorator = self.rng.gen_range(0..self.decorators.len());
        self.propose_refine_with(parent, decorator)
    }

    fn rule_label(&self, index: usize) -> Label {
        self.state
            .rules
            .get(index)
            .map(|rule| rule.label.clone())
            .unwrap_or_else(|| Label::new(""))
    }

    fn propose_refine_with(
        &self,
        parent_index: usize,
        decorator_index: usize,
    ) -> (Move, Result<SamplerState, ProposalError>) {
        let decorator = self.decorators[decorator_index].clone();
        let proposal = Move::Refine {
            parent: self.rule_label(parent_index),
            decorator: Some(decorator.clone()),
        };
        let result = self.refine(parent_index, &decorator);
        (proposal, result)
    }

    fn refine(
        &self,
        parent_index: usize,
        decorator: &Decorator,
    ) -> Result<SamplerState, ProposalError> {
        let parent: &Rule = self
            .state
            .rules
            .get(parent_index)
            .ok_or_else(|| ProposalError::Pattern(format!("no rule at {parent_index}")))?;
        let child = parent
            .refine(decorator, &self.bindings)
            .map_err(|error| ProposalError::Pattern(error.to_string()))?;
        debug!(
            "Attempting to create new subtype: '{}' ({}) + '{}' ({}) -> '{}' ({})",
            parent.pattern,
            parent.label,
            decorator.fragment,
            decorator.name,
            child.pattern,
            child.label
        );

        // Duplicates are rejected before any typing happens.
        if self.state.rules.contains_label(&child.label) {
            return Err(ProposalError::DuplicateLabel(child.label));
        }
        if self.state.rules.contains_pattern(&child.pattern, &self.bindings) {
            return Err(ProposalError::DuplicatePattern(child.pattern));
        }

        let parent_label = parent.label.clone();
        let child_label = child.label.clone();
        let mut rules = self.state.rules.clone();
        rules.insert(parent_index + 1, child);

        let labels = AtomTyper::new(&rules, &self.bindings).assign(self.corpus, self.matcher)?;
        if labels.count(&child_label) == 0 {
            return Err(ProposalError::UnusedType(child_label));
        }
        if labels.count(&parent_label) == 0 {
            return Err(ProposalError::StarvedParent(parent_label));
        }
        self.score(rules, labels)
    }

    /// Type the corpus with `rules` and score the result.
    fn evaluate(&self, rules: RuleList) -> Result<SamplerState, ProposalError> {
        let labels = AtomTyper::new(&rules, &self.bindings).assign(self.corpus, self.matcher)?;
        self.score(rules, labels)
    }

    fn score(&self, rules: RuleList, labels: LabelMap) -> Result<SamplerState, ProposalError> {
        let matches = match &self.scorer {
            Some(scorer) => Some(scorer.score(&labels).map_err(ProposalError::Score)?),
            None => None,
        };
        Ok(SamplerState {
            rules,
            labels,
            total_matched: matches.as_ref().map_or(0, |m| m.total_matched),
            matches,
            total_atoms: self.state.total_atoms,
            temperature: self.config.temperature,
        })
    }
}

fn verdict_word(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Accepted => "accepted".to_string(),
        Verdict::Rejected => "rejected".to_string(),
        Verdict::Invalid(error) => format!("invalid ({error})"),
    }
}
