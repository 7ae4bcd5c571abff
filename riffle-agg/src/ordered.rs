use crate::segment::{LinkedCol, LINKED_CAPACITY};
use riffle_base::{err_internal, BufferPool, CancelToken, Result};
use riffle_func::Aggregate;
use riffle_sort::{GlobalSort, LocalSort, SortConfig, SortSpec};
use riffle_vec::{Chunk, ChunkCollection, Column, DataTy, ValueBuffer, VECTOR_SIZE};
use std::sync::Arc;
use tracing::trace;

/// Bind-time description of one ordered aggregate.
pub struct OrderedSpec {
    pub inner: Arc<dyn Aggregate>,
    pub arg_types: Vec<DataTy>,
    pub sort_types: Vec<DataTy>,
    pub specs: Vec<SortSpec>,
    /// The sort keys are the argument columns; buffer them once.
    pub sorted_on_args: bool,
    /// Unsorted rows accumulated across groups before a finalize batch
    /// runs its sort.
    pub threshold: usize,
    pub sort_cfg: SortConfig,
    pub pool: Arc<dyn BufferPool>,
    pub cancel: CancelToken,
}

impl OrderedSpec {
    pub fn result_ty(&self) -> Result<DataTy> {
        self.inner.result_ty(&self.arg_types)
    }
}

/// Per-group buffered rows, promoted linked -> chunk -> collection as the
/// group grows. Promotion is irreversible.
#[derive(Default)]
pub struct GroupBuf {
    count: usize,
    sort_linked: Vec<LinkedCol>,
    arg_linked: Vec<LinkedCol>,
    sort_chunk: Option<Box<Chunk>>,
    arg_chunk: Option<Box<Chunk>>,
    sort_coll: Option<ChunkCollection>,
    arg_coll: Option<ChunkCollection>,
}

impl GroupBuf {
    pub fn new() -> GroupBuf {
        GroupBuf::default()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    fn init_linked(&mut self, spec: &OrderedSpec) {
        if self.sort_linked.is_empty() {
            self.sort_linked = spec.sort_types.iter().cloned().map(LinkedCol::new).collect();
            if !spec.sorted_on_args {
                self.arg_linked = spec.arg_types.iter().cloned().map(LinkedCol::new).collect();
            }
        }
    }

    fn flush_linked(&mut self, spec: &OrderedSpec) -> Result<()> {
        let mut sort_chunk = Box::new(Chunk::new(&spec.sort_types));
        let mut rows = 0;
        for (i, linked) in self.sort_linked.iter().enumerate() {
            rows = linked.rows();
            linked.flush_into(sort_chunk.flat_mut(i)?)?;
        }
        sort_chunk.set_rows(rows);
        self.sort_chunk = Some(sort_chunk);
        if !spec.sorted_on_args {
            let mut arg_chunk = Box::new(Chunk::new(&spec.arg_types));
            let mut rows = 0;
            for (i, linked) in self.arg_linked.iter().enumerate() {
                rows = linked.rows();
                linked.flush_into(arg_chunk.flat_mut(i)?)?;
            }
            arg_chunk.set_rows(rows);
            self.arg_chunk = Some(arg_chunk);
        }
        self.sort_linked.clear();
        self.arg_linked.clear();
        Ok(())
    }

    fn init_collections(&mut self, spec: &OrderedSpec) -> Result<()> {
        let mut coll = ChunkCollection::new(spec.pool.clone(), spec.sort_types.clone());
        if let Some(chunk) = self.sort_chunk.take() {
            coll.append_chunk(&chunk)?;
        }
        self.sort_coll = Some(coll);
        if !spec.sorted_on_args {
            let mut coll = ChunkCollection::new(spec.pool.clone(), spec.arg_types.clone());
            if let Some(chunk) = self.arg_chunk.take() {
                coll.append_chunk(&chunk)?;
            }
            self.arg_coll = Some(coll);
        }
        Ok(())
    }

    /// Establish the tier for `n` buffered rows.
    fn resize(&mut self, spec: &OrderedSpec, n: usize) -> Result<()> {
        self.count = n;
        if n <= LINKED_CAPACITY {
            self.init_linked(spec);
        }
        if n > LINKED_CAPACITY && self.sort_chunk.is_none() && self.sort_coll.is_none() {
            trace!(target: "riffle", "group buffer leaves linked tier at {} rows", n);
            self.flush_linked(spec)?;
        }
        if n > VECTOR_SIZE && self.sort_coll.is_none() {
            trace!(target: "riffle", "group buffer leaves chunk tier at {} rows", n);
            self.init_collections(spec)?;
        }
        Ok(())
    }

    /// Whole-chunk update for a single target state.
    pub fn update(&mut self, spec: &OrderedSpec, sort_in: &Chunk, arg_in: &Chunk) -> Result<()> {
        let sel: Vec<u32> = (0..sort_in.rows() as u32).collect();
        self.update_sel(spec, sort_in, arg_in, &sel)
    }

    /// Update with a per-state selection over the input chunk.
    pub fn update_sel(
        &mut self,
        spec: &OrderedSpec,
        sort_in: &Chunk,
        arg_in: &Chunk,
        sel: &[u32],
    ) -> Result<()> {
        self.resize(spec, self.count + sel.len())?;
        if self.sort_coll.is_some() {
            if let Some(coll) = self.sort_coll.as_mut() {
                coll.append_sel(sort_in, sel)?;
            }
            if let Some(coll) = self.arg_coll.as_mut() {
                coll.append_sel(arg_in, sel)?;
            }
        } else if self.sort_chunk.is_some() {
            if let Some(chunk) = self.sort_chunk.as_mut() {
                chunk.append_sel(sort_in, sel)?;
            }
            if let Some(chunk) = self.arg_chunk.as_mut() {
                chunk.append_sel(arg_in, sel)?;
            }
        } else {
            for (i, linked) in self.sort_linked.iter_mut().enumerate() {
                for &row in sel {
                    linked.append_row(sort_in.col(i), row as usize)?;
                }
            }
            for (i, linked) in self.arg_linked.iter_mut().enumerate() {
                for &row in sel {
                    linked.append_row(arg_in.col(i), row as usize)?;
                }
            }
        }
        Ok(())
    }

    /// Fold another group's rows after this one's, promoting to the
    /// higher of the two tiers first.
    pub fn absorb(&mut self, spec: &OrderedSpec, other: &mut GroupBuf) -> Result<()> {
        if other.count == 0 {
            return Ok(());
        }
        if self.count == 0 {
            std::mem::swap(self, other);
            return Ok(());
        }
        let total = self.count + other.count;
        self.resize(spec, total)?;

        if self.sort_chunk.is_none() && self.sort_coll.is_none() {
            // Both fit in the linked tier; splice the chains.
            for (dst, src) in self.sort_linked.iter_mut().zip(other.sort_linked.drain(..)) {
                dst.absorb(src);
            }
            for (dst, src) in self.arg_linked.iter_mut().zip(other.arg_linked.drain(..)) {
                dst.absorb(src);
            }
        } else {
            if other.sort_chunk.is_none() && other.sort_coll.is_none() {
                other.flush_linked(spec)?;
            }
            if self.sort_coll.is_some() {
                match other.sort_coll.take() {
                    Some(coll) => {
                        if let Some(dst) = self.sort_coll.as_mut() {
                            dst.combine(coll)?;
                        }
                    }
                    None => {
                        let chunk = other
                            .sort_chunk
                            .take()
                            .ok_or_else(|| err_internal("absorb source lost its sort buffer"))?;
                        if let Some(dst) = self.sort_coll.as_mut() {
                            dst.append_chunk(&chunk)?;
                        }
                    }
                }
                if self.arg_coll.is_some() {
                    match other.arg_coll.take() {
                        Some(coll) => {
                            if let Some(dst) = self.arg_coll.as_mut() {
                                dst.combine(coll)?;
                            }
                        }
                        None => {
                            let chunk = other.arg_chunk.take().ok_or_else(|| {
                                err_internal("absorb source lost its argument buffer")
                            })?;
                            if let Some(dst) = self.arg_coll.as_mut() {
                                dst.append_chunk(&chunk)?;
                            }
                        }
                    }
                }
            } else {
                let src = other
                    .sort_chunk
                    .take()
                    .ok_or_else(|| err_internal("absorb source lost its sort buffer"))?;
                if let Some(dst) = self.sort_chunk.as_mut() {
                    dst.append_chunk(&src)?;
                }
                if let Some(dst) = self.arg_chunk.as_mut() {
                    let src = other
                        .arg_chunk
                        .take()
                        .ok_or_else(|| err_internal("absorb source lost its argument buffer"))?;
                    dst.append_chunk(&src)?;
                }
            }
        }
        other.reset();
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = GroupBuf::default();
    }

    /// Sink every buffered row into the sort behind the group prefix,
    /// then release the buffers.
    fn sink_into_sort(
        &mut self,
        spec: &OrderedSpec,
        group_idx: i64,
        local: &mut LocalSort,
    ) -> Result<()> {
        if self.count == 0 {
            self.reset();
            return Ok(());
        }
        if self.sort_chunk.is_none() && self.sort_coll.is_none() {
            self.flush_linked(spec)?;
        }
        if let Some(coll) = self.sort_coll.take() {
            let mut sort_out = Chunk::new(&spec.sort_types);
            let mut scan = coll.scan();
            match self.arg_coll.take() {
                Some(args) => {
                    let mut arg_out = Chunk::new(&spec.arg_types);
                    let mut arg_scan = args.scan();
                    while scan.next(&mut sort_out)? {
                        if !arg_scan.next(&mut arg_out)? || arg_out.rows() != sort_out.rows() {
                            return Err(err_internal("sort and argument buffers disagree"));
                        }
                        sink_pair(spec, group_idx, &sort_out, &arg_out, local)?;
                    }
                }
                None => {
                    while scan.next(&mut sort_out)? {
                        sink_pair(spec, group_idx, &sort_out, &sort_out, local)?;
                    }
                }
            }
        } else {
            let sort_chunk = self
                .sort_chunk
                .take()
                .ok_or_else(|| err_internal("group buffer lost its sort chunk"))?;
            match self.arg_chunk.take() {
                Some(args) => sink_pair(spec, group_idx, &sort_chunk, &args, local)?,
                None => sink_pair(spec, group_idx, &sort_chunk, &sort_chunk, local)?,
            }
        }
        self.reset();
        Ok(())
    }
}

fn sink_pair(
    spec: &OrderedSpec,
    group_idx: i64,
    sort_chunk: &Chunk,
    args: &Chunk,
    local: &mut LocalSort,
) -> Result<()> {
    spec.cancel.check()?;
    let mut cols = Vec::with_capacity(1 + sort_chunk.width());
    cols.push(Column::constant_int(group_idx));
    for col in sort_chunk.cols() {
        cols.push(col.clone());
    }
    let prefixed = Chunk::from_columns(cols, sort_chunk.rows())?;
    local.sink(&prefixed, args)
}

/// Distribute one input chunk over many group states: build each state's
/// selection in one pass, then apply one sliced update per state.
pub fn scatter_update(
    spec: &OrderedSpec,
    sort_in: &Chunk,
    arg_in: &Chunk,
    groups: &[u32],
    states: &mut [GroupBuf],
) -> Result<()> {
    if groups.len() != sort_in.rows() {
        return Err(err_internal("group vector length disagrees with chunk"));
    }
    let mut sels: Vec<Vec<u32>> = vec![Vec::new(); states.len()];
    for (row, &state_idx) in groups.iter().enumerate() {
        let sel = sels
            .get_mut(state_idx as usize)
            .ok_or_else(|| err_internal("group index out of range"))?;
        sel.push(row as u32);
    }
    for (state_idx, sel) in sels.iter().enumerate() {
        if sel.is_empty() {
            continue;
        }
        states[state_idx].update_sel(spec, sort_in, arg_in, sel)?;
    }
    Ok(())
}

/// Finalize a batch of groups: sort each flush's buffered tuples behind
/// the group prefix, then walk the sorted stream feeding the inner
/// aggregate one contiguous group at a time. Groups with no input still
/// produce one initialize -> finalize value.
pub fn finalize_batch(
    spec: &OrderedSpec,
    states: &mut [GroupBuf],
    out: &mut ValueBuffer,
) -> Result<()> {
    let count = states.len();
    let mut unprocessed: Vec<usize> = states.iter().map(GroupBuf::count).collect();

    let mut key_types = Vec::with_capacity(1 + spec.sort_types.len());
    key_types.push(DataTy::Int);
    key_types.extend(spec.sort_types.iter().cloned());
    let mut key_specs = Vec::with_capacity(1 + spec.specs.len());
    key_specs.push(SortSpec::default());
    key_specs.extend(spec.specs.iter().copied());

    let mut sorted = 0usize;
    let mut finalized = 0usize;
    while finalized < count {
        spec.cancel.check()?;
        let global = GlobalSort::new(
            &key_types,
            &key_specs,
            &spec.arg_types,
            spec.pool.clone(),
            spec.sort_cfg.clone(),
            spec.cancel.clone(),
        )?;
        let mut local = global.local();
        let mut unsorted_rows = 0usize;
        while finalized < count && unsorted_rows < spec.threshold.max(1) {
            unsorted_rows += states[finalized].count();
            states[finalized].sink_into_sort(spec, finalized as i64, &mut local)?;
            finalized += 1;
        }
        if unsorted_rows == 0 {
            break;
        }

        global.add_local(local)?;
        global.sort_all()?;
        let mut scan = global.scan()?;
        let mut chunk = scan.output_chunk();
        let mut state = spec.inner.new_state();
        while scan.scan(&mut chunk)? {
            let mut consumed = 0usize;
            while consumed < chunk.rows() {
                while unprocessed[sorted] == 0 {
                    spec.inner.finalize(state.as_mut(), out)?;
                    state = spec.inner.new_state();
                    sorted += 1;
                }
                let take = unprocessed[sorted].min(chunk.rows() - consumed);
                let sel: Vec<u32> = (consumed as u32..(consumed + take) as u32).collect();
                spec.inner.update(state.as_mut(), &chunk, &sel)?;
                consumed += take;
                unprocessed[sorted] -= take;
            }
        }
        spec.inner.finalize(state.as_mut(), out)?;
        sorted += 1;
    }

    while sorted < count {
        let mut state = spec.inner.new_state();
        spec.inner.finalize(state.as_mut(), out)?;
        sorted += 1;
    }
    Ok(())
}
