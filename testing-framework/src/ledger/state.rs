//! Ledger state: accounts, tokens, relationships and network properties.
//!
//! Handlers never mutate the committed state directly. They run against a
//! clone, and the clone replaces the committed state only when the
//! transaction finalizes with SUCCESS. The same trick gives each precompile
//! call inside a contract its own rollback point.

use hts_common::abi::Token;
use hts_common::crypto::{EvmAddress, Key};
use hts_common::query::{AccountBalance, AccountInfo, AccountLookup, ContractInfo, KycStatus, TokenInfo, TokenRelationship};
use hts_common::record::TokenAssociation;
use hts_common::transaction::{
    AccountAmount, CryptoAllowance, NftTransfer, TokenAllowance, TokenTransferList, TokenType,
};
use hts_common::{AccountId, ContractId, ResponseCode, TokenId};
use std::collections::{BTreeMap, BTreeSet};

pub const LAZY_CREATION_ENABLED: &str = "lazyCreation.enabled";
pub const ALLOW_AUTO_ASSOCIATIONS: &str = "contracts.allowAutoAssociations";
pub const MAX_PRECEDING_RECORDS: &str = "consensus.handle.maxPrecedingRecords";

/// Network properties and their defaults
pub const DEFAULT_PROPERTIES: &[(&str, &str)] = &[
    (LAZY_CREATION_ENABLED, "true"),
    (ALLOW_AUTO_ASSOCIATIONS, "false"),
    (MAX_PRECEDING_RECORDS, "3"),
];

pub const GENESIS_ACCOUNT: AccountId = AccountId::from_num(2);
pub const FEE_COLLECTOR: AccountId = AccountId::from_num(98);
pub const FIRST_USER_ENTITY: u64 = 1001;

pub const HOLLOW_ACCOUNT_MEMO: &str = "lazy-created account";

#[derive(Debug, Clone)]
pub struct AccountState {
    pub key: Key,
    pub alias: Option<EvmAddress>,
    pub balance: u64,
    pub receiver_sig_required: bool,
    pub memo: String,
    /// -1 is unlimited
    pub max_automatic_token_associations: i32,
    pub used_automatic_associations: i32,
    /// spender -> tinybars
    pub crypto_allowances: BTreeMap<AccountId, u64>,
    pub token_allowances: BTreeMap<(TokenId, AccountId), u64>,
    pub nft_approved_for_all: BTreeSet<(TokenId, AccountId)>,
}

impl AccountState {
    pub fn new(key: Key, balance: u64) -> Self {
        Self {
            key,
            alias: None,
            balance,
            receiver_sig_required: false,
            memo: String::new(),
            max_automatic_token_associations: 0,
            used_automatic_associations: 0,
            crypto_allowances: BTreeMap::new(),
            token_allowances: BTreeMap::new(),
            nft_approved_for_all: BTreeSet::new(),
        }
    }

    pub fn hollow(alias: EvmAddress) -> Self {
        let mut account = Self::new(Key::Empty, 0);
        account.alias = Some(alias);
        account.memo = HOLLOW_ACCOUNT_MEMO.to_string();
        account.max_automatic_token_associations = -1;
        account
    }

    pub fn is_hollow(&self) -> bool {
        self.key.is_empty()
    }

    fn can_auto_associate(&self) -> bool {
        self.max_automatic_token_associations < 0
            || self.used_automatic_associations < self.max_automatic_token_associations
    }
}

#[derive(Debug, Clone)]
pub struct TokenState {
    pub name: String,
    pub symbol: String,
    pub token_type: TokenType,
    pub decimals: u32,
    pub total_supply: u64,
    pub treasury: AccountId,
    pub admin_key: Option<Key>,
    pub supply_key: Option<Key>,
    pub kyc_key: Option<Key>,
    pub next_serial: i64,
}

impl TokenState {
    fn initial_kyc(&self) -> KycStatus {
        if self.kyc_key.is_some() {
            KycStatus::Revoked
        } else {
            KycStatus::KycNotApplicable
        }
    }
}

#[derive(Debug, Clone)]
pub struct NftState {
    pub owner: AccountId,
    pub metadata: Vec<u8>,
    pub spender: Option<AccountId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship {
    pub balance: u64,
    pub kyc: KycStatus,
    pub automatic: bool,
}

#[derive(Debug, Clone)]
pub struct ContractState {
    pub program: String,
    pub admin_key: Option<Key>,
    pub memo: String,
    /// Decoded constructor arguments
    pub storage: Vec<Token>,
}

/// Who is authorizing the movements of one transfer
#[derive(Debug, Clone, Copy)]
pub enum Authorizer<'a> {
    /// Top-level signatures; approvals are spent by the payer
    Signatures { verified: &'a [Vec<u8>], payer: AccountId },
    /// A contract calling the token precompile; approvals are spent by the caller
    Contract { caller: ContractId, verified: &'a [Vec<u8>] },
}

impl Authorizer<'_> {
    pub fn is_active(&self, key: &Key) -> bool {
        let (verified, caller) = match self {
            Authorizer::Signatures { verified, .. } => (*verified, None),
            Authorizer::Contract { caller, verified } => (*verified, Some(*caller)),
        };
        key.is_satisfied_by(&mut |leaf| match leaf {
            Key::Secp256k1(public_key) => verified.iter().any(|v| v == public_key),
            Key::ContractId(id) | Key::DelegatableContractId(id) => caller == Some(*id),
            _ => false,
        })
    }

    pub fn spender(&self) -> AccountId {
        match self {
            Authorizer::Signatures { payer, .. } => *payer,
            Authorizer::Contract { caller, .. } => AccountId::from(*caller),
        }
    }

    /// Status for a required key that is not active
    pub fn signature_failure(&self) -> ResponseCode {
        match self {
            Authorizer::Signatures { .. } => ResponseCode::InvalidSignature,
            Authorizer::Contract { .. } => ResponseCode::InvalidFullPrefixSignatureForPrecompile,
        }
    }

    fn is_caller(&self, account: AccountId) -> bool {
        matches!(self, Authorizer::Contract { caller, .. } if AccountId::from(*caller) == account)
    }

    pub fn require(&self, key: &Key) -> Result<(), ResponseCode> {
        if self.is_active(key) {
            Ok(())
        } else {
            Err(self.signature_failure())
        }
    }

    /// Key of `account` must be active, unless the account is the calling contract
    fn require_account(&self, account: AccountId, state: &AccountState) -> Result<(), ResponseCode> {
        if self.is_caller(account) {
            return Ok(());
        }
        self.require(&state.key)
    }
}

/// Net effect of a transfer, as written into records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferEffects {
    pub hbar_transfers: Vec<AccountAmount>,
    pub token_transfer_lists: Vec<TokenTransferList>,
    pub automatic_token_associations: Vec<TokenAssociation>,
}

type Checked<T> = Result<T, ResponseCode>;

#[derive(Debug, Clone)]
pub struct LedgerState {
    next_entity: u64,
    pub accounts: BTreeMap<AccountId, AccountState>,
    pub aliases: BTreeMap<EvmAddress, AccountId>,
    pub tokens: BTreeMap<TokenId, TokenState>,
    pub contracts: BTreeMap<ContractId, ContractState>,
    pub relationships: BTreeMap<(AccountId, TokenId), Relationship>,
    pub nfts: BTreeMap<(TokenId, i64), NftState>,
    pub properties: BTreeMap<String, String>,
}

impl LedgerState {
    pub fn new(genesis_key: Key, genesis_balance: u64) -> Self {
        let mut accounts = BTreeMap::new();
        accounts.insert(GENESIS_ACCOUNT, AccountState::new(genesis_key, genesis_balance));
        accounts.insert(FEE_COLLECTOR, AccountState::new(Key::Empty, 0));
        Self {
            next_entity: FIRST_USER_ENTITY,
            accounts,
            aliases: BTreeMap::new(),
            tokens: BTreeMap::new(),
            contracts: BTreeMap::new(),
            relationships: BTreeMap::new(),
            nfts: BTreeMap::new(),
            properties: default_properties(),
        }
    }

    pub fn next_entity_num(&mut self) -> u64 {
        let num = self.next_entity;
        self.next_entity += 1;
        num
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.property(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn number(&self, key: &str) -> u64 {
        self.property(key).and_then(|v| v.parse().ok()).unwrap_or_default()
    }

    pub fn set_property(&mut self, key: &str, value: &str) {
        self.properties.insert(key.to_string(), value.to_string());
    }

    pub fn reset_property(&mut self, key: &str) {
        match DEFAULT_PROPERTIES.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => self.set_property(key, value),
            None => {
                self.properties.remove(key);
            }
        }
    }

    pub fn account(&self, id: &AccountId) -> Checked<&AccountState> {
        self.accounts.get(id).ok_or(ResponseCode::InvalidAccountId)
    }

    pub fn account_mut(&mut self, id: &AccountId) -> Checked<&mut AccountState> {
        self.accounts.get_mut(id).ok_or(ResponseCode::InvalidAccountId)
    }

    pub fn token(&self, id: &TokenId) -> Checked<&TokenState> {
        self.tokens.get(id).ok_or(ResponseCode::InvalidTokenId)
    }

    pub fn token_mut(&mut self, id: &TokenId) -> Checked<&mut TokenState> {
        self.tokens.get_mut(id).ok_or(ResponseCode::InvalidTokenId)
    }

    pub fn lookup(&self, lookup: &AccountLookup) -> Checked<AccountId> {
        match lookup {
            AccountLookup::Id(id) => self.account(id).map(|_| *id),
            AccountLookup::Alias(alias) => self.resolve_address(alias).ok_or(ResponseCode::InvalidAccountId),
        }
    }

    /// Account behind a mirror address or an alias
    pub fn resolve_address(&self, address: &EvmAddress) -> Option<AccountId> {
        if address.is_mirror() {
            let id = AccountId::from_mirror_address(address).ok()?;
            return self.accounts.contains_key(&id).then_some(id);
        }
        self.aliases.get(address).copied()
    }

    pub fn resolve_token(&self, address: &EvmAddress) -> Option<TokenId> {
        let id = TokenId::from_mirror_address(address).ok()?;
        self.tokens.contains_key(&id).then_some(id)
    }

    pub fn create_account(&mut self, account: AccountState) -> AccountId {
        let id = AccountId::from_num(self.next_entity_num());
        if let Some(alias) = account.alias {
            self.aliases.insert(alias, id);
        }
        self.accounts.insert(id, account);
        id
    }

    pub fn relationship(&self, account: AccountId, token: TokenId) -> Option<&Relationship> {
        self.relationships.get(&(account, token))
    }

    pub fn associate(&mut self, account: AccountId, token: TokenId, automatic: bool) -> Checked<()> {
        if self.relationships.contains_key(&(account, token)) {
            return Err(ResponseCode::TokenAlreadyAssociatedToAccount);
        }
        let kyc = self.token(&token)?.initial_kyc();
        self.relationships.insert(
            (account, token),
            Relationship {
                balance: 0,
                kyc,
                automatic,
            },
        );
        Ok(())
    }

    pub fn dissociate(&mut self, account: AccountId, token: TokenId) -> Checked<()> {
        let relationship = *self
            .relationship(account, token)
            .ok_or(ResponseCode::TokenNotAssociatedToAccount)?;
        if self.tokens.get(&token).is_some_and(|t| t.treasury == account) {
            return Err(ResponseCode::AccountIsTreasury);
        }
        if relationship.balance > 0 {
            return Err(ResponseCode::TransactionRequiresZeroTokenBalances);
        }
        self.relationships.remove(&(account, token));
        if relationship.automatic {
            let state = self.account_mut(&account)?;
            state.used_automatic_associations = (state.used_automatic_associations - 1).max(0);
        }
        Ok(())
    }

    pub fn set_kyc(&mut self, token: TokenId, account: AccountId, granted: bool, auth: &Authorizer) -> Checked<()> {
        let kyc_key = self
            .token(&token)?
            .kyc_key
            .clone()
            .ok_or(ResponseCode::TokenHasNoKycKey)?;
        auth.require(&kyc_key)?;
        self.account(&account)?;
        let relationship = self
            .relationships
            .get_mut(&(account, token))
            .ok_or(ResponseCode::TokenNotAssociatedToAccount)?;
        relationship.kyc = if granted { KycStatus::Granted } else { KycStatus::Revoked };
        Ok(())
    }

    pub fn is_kyc_granted(&self, token: TokenId, account: AccountId) -> Checked<bool> {
        self.token(&token)?;
        self.account(&account)?;
        Ok(self
            .relationship(account, token)
            .is_some_and(|rel| rel.kyc == KycStatus::Granted))
    }

    /// Mint to the treasury; returns the new total supply and any new serials
    pub fn mint(
        &mut self,
        token: TokenId,
        amount: u64,
        metadata: &[Vec<u8>],
        auth: &Authorizer,
    ) -> Checked<(u64, Vec<i64>, TokenTransferList)> {
        let token_state = self.token(&token)?;
        let supply_key = token_state.supply_key.clone().ok_or(ResponseCode::TokenHasNoSupplyKey)?;
        auth.require(&supply_key)?;
        let treasury = token_state.treasury;
        let token_type = token_state.token_type;

        let (minted, serials, list) = match token_type {
            TokenType::FungibleCommon => {
                if amount == 0 || !metadata.is_empty() {
                    return Err(ResponseCode::InvalidTokenMintAmount);
                }
                let list = TokenTransferList::fungible(token, vec![AccountAmount::new(treasury, to_signed(amount)?)]);
                (amount, Vec::new(), list)
            }
            TokenType::NonFungibleUnique => {
                if amount != 0 || metadata.is_empty() {
                    return Err(ResponseCode::InvalidTokenMintAmount);
                }
                let token_state = self.token_mut(&token)?;
                let first = token_state.next_serial;
                token_state.next_serial += metadata.len() as i64;
                let serials: Vec<i64> = (first..first + metadata.len() as i64).collect();
                for (serial, data) in serials.iter().zip(metadata) {
                    self.nfts.insert(
                        (token, *serial),
                        NftState {
                            owner: treasury,
                            metadata: data.clone(),
                            spender: None,
                        },
                    );
                }
                let transfers = serials
                    .iter()
                    .map(|serial| NftTransfer {
                        sender: AccountId::default(),
                        receiver: treasury,
                        serial_number: *serial,
                        is_approval: false,
                    })
                    .collect();
                (metadata.len() as u64, serials, TokenTransferList::nft(token, transfers))
            }
        };

        self.credit_token(treasury, token, minted)?;
        let token_state = self.token_mut(&token)?;
        token_state.total_supply = token_state
            .total_supply
            .checked_add(minted)
            .ok_or(ResponseCode::InvalidTokenMintAmount)?;
        Ok((token_state.total_supply, serials, list))
    }

    /// Burn from the treasury; returns the new total supply
    pub fn burn(
        &mut self,
        token: TokenId,
        amount: u64,
        serial_numbers: &[i64],
        auth: &Authorizer,
    ) -> Checked<(u64, TokenTransferList)> {
        let token_state = self.token(&token)?;
        let supply_key = token_state.supply_key.clone().ok_or(ResponseCode::TokenHasNoSupplyKey)?;
        auth.require(&supply_key)?;
        let treasury = token_state.treasury;
        let token_type = token_state.token_type;

        let (burned, list) = match token_type {
            TokenType::FungibleCommon => {
                if amount == 0 || !serial_numbers.is_empty() {
                    return Err(ResponseCode::InvalidTokenBurnAmount);
                }
                let list = TokenTransferList::fungible(token, vec![AccountAmount::new(treasury, -to_signed(amount)?)]);
                (amount, list)
            }
            TokenType::NonFungibleUnique => {
                if amount != 0 || serial_numbers.is_empty() {
                    return Err(ResponseCode::InvalidTokenBurnAmount);
                }
                let mut transfers = Vec::with_capacity(serial_numbers.len());
                for serial in serial_numbers {
                    let nft = self.nfts.get(&(token, *serial)).ok_or(ResponseCode::InvalidNftId)?;
                    if nft.owner != treasury {
                        return Err(ResponseCode::SenderDoesNotOwnNftSerialNo);
                    }
                    self.nfts.remove(&(token, *serial));
                    transfers.push(NftTransfer {
                        sender: treasury,
                        receiver: AccountId::default(),
                        serial_number: *serial,
                        is_approval: false,
                    });
                }
                (serial_numbers.len() as u64, TokenTransferList::nft(token, transfers))
            }
        };

        let relationship = self
            .relationships
            .get_mut(&(treasury, token))
            .ok_or(ResponseCode::TokenNotAssociatedToAccount)?;
        relationship.balance = relationship
            .balance
            .checked_sub(burned)
            .ok_or(ResponseCode::InsufficientTokenBalance)?;
        let token_state = self.token_mut(&token)?;
        token_state.total_supply = token_state.total_supply.saturating_sub(burned);
        Ok((token_state.total_supply, list))
    }

    pub fn approve_crypto(&mut self, allowance: &CryptoAllowance, auth: &Authorizer) -> Checked<()> {
        self.check_allowance_parties(allowance.owner, allowance.spender, auth)?;
        let owner = self.account_mut(&allowance.owner)?;
        if allowance.amount == 0 {
            owner.crypto_allowances.remove(&allowance.spender);
        } else {
            owner.crypto_allowances.insert(allowance.spender, allowance.amount);
        }
        Ok(())
    }

    pub fn approve_token(&mut self, allowance: &TokenAllowance, auth: &Authorizer) -> Checked<()> {
        self.token(&allowance.token)?;
        self.check_allowance_parties(allowance.owner, allowance.spender, auth)?;
        if self.relationship(allowance.owner, allowance.token).is_none() {
            return Err(ResponseCode::TokenNotAssociatedToAccount);
        }
        let owner = self.account_mut(&allowance.owner)?;
        let key = (allowance.token, allowance.spender);
        if allowance.amount == 0 {
            owner.token_allowances.remove(&key);
        } else {
            owner.token_allowances.insert(key, allowance.amount);
        }
        Ok(())
    }

    pub fn approve_nfts(
        &mut self,
        token: TokenId,
        owner: AccountId,
        spender: AccountId,
        serial_numbers: &[i64],
        approved_for_all: bool,
        auth: &Authorizer,
    ) -> Checked<()> {
        self.token(&token)?;
        self.check_allowance_parties(owner, spender, auth)?;
        for serial in serial_numbers {
            let nft = self.nfts.get_mut(&(token, *serial)).ok_or(ResponseCode::InvalidNftId)?;
            if nft.owner != owner {
                return Err(ResponseCode::SenderDoesNotOwnNftSerialNo);
            }
            nft.spender = Some(spender);
        }
        if approved_for_all {
            self.account_mut(&owner)?.nft_approved_for_all.insert((token, spender));
        }
        Ok(())
    }

    pub fn token_allowance(&self, token: TokenId, owner: AccountId, spender: AccountId) -> Checked<u64> {
        self.token(&token)?;
        let owner = self.accounts.get(&owner).ok_or(ResponseCode::InvalidAllowanceOwnerId)?;
        if !self.accounts.contains_key(&spender) {
            return Err(ResponseCode::InvalidAllowanceSpenderId);
        }
        Ok(owner.token_allowances.get(&(token, spender)).copied().unwrap_or_default())
    }

    fn check_allowance_parties(&self, owner: AccountId, spender: AccountId, auth: &Authorizer) -> Checked<()> {
        let owner_state = self.accounts.get(&owner).ok_or(ResponseCode::InvalidAllowanceOwnerId)?;
        if !self.accounts.contains_key(&spender) {
            return Err(ResponseCode::InvalidAllowanceSpenderId);
        }
        auth.require_account(owner, owner_state)
    }

    /// Validate and apply a set of hbar and token movements atomically.
    ///
    /// On error the state may be partially modified; callers run this against
    /// a scratch copy.
    pub fn apply_transfers(
        &mut self,
        hbar: &[AccountAmount],
        tokens: &[TokenTransferList],
        auth: &Authorizer,
    ) -> Checked<TransferEffects> {
        if hbar.iter().map(|aa| aa.amount as i128).sum::<i128>() != 0 {
            return Err(ResponseCode::InvalidAccountAmounts);
        }
        for list in tokens {
            if list.transfers.iter().map(|aa| aa.amount as i128).sum::<i128>() != 0 {
                return Err(ResponseCode::TransfersNotZeroSumForToken);
            }
        }

        let mut effects = TransferEffects::default();

        for aa in hbar {
            let account = self.account(&aa.account)?;
            if aa.amount < 0 {
                if aa.is_approval {
                    self.spend_crypto_allowance(aa.account, aa.amount.unsigned_abs(), auth)?;
                } else {
                    auth.require_account(aa.account, account)?;
                }
            } else if aa.amount > 0 && account.receiver_sig_required {
                auth.require_account(aa.account, account)?;
            }
        }
        let hbar_net = net_amounts(hbar)?;
        for (account, amount) in &hbar_net {
            let state = self.account_mut(account)?;
            state.balance = if *amount < 0 {
                state
                    .balance
                    .checked_sub(amount.unsigned_abs())
                    .ok_or(ResponseCode::InsufficientAccountBalance)?
            } else {
                state
                    .balance
                    .checked_add(*amount as u64)
                    .ok_or(ResponseCode::InvalidAccountAmounts)?
            };
        }
        effects.hbar_transfers = hbar_net
            .into_iter()
            .filter(|(_, amount)| *amount != 0)
            .map(|(account, amount)| AccountAmount::new(account, amount))
            .collect();

        for list in tokens {
            let applied = self.apply_token_list(list, auth, &mut effects.automatic_token_associations)?;
            effects.token_transfer_lists.push(applied);
        }
        Ok(effects)
    }

    fn apply_token_list(
        &mut self,
        list: &TokenTransferList,
        auth: &Authorizer,
        associations: &mut Vec<TokenAssociation>,
    ) -> Checked<TokenTransferList> {
        let token = list.token;
        self.token(&token)?;

        for aa in &list.transfers {
            let account = self.account(&aa.account)?;
            if aa.amount < 0 {
                if aa.is_approval {
                    self.spend_token_allowance(token, aa.account, aa.amount.unsigned_abs(), auth)?;
                } else {
                    auth.require_account(aa.account, account)?;
                }
            } else if aa.amount > 0 && account.receiver_sig_required {
                auth.require_account(aa.account, account)?;
            }
        }

        let net = net_amounts(&list.transfers)?;
        for (account, amount) in &net {
            if *amount < 0 {
                self.usable_relationship(*account, token)?;
                self.debit_token(*account, token, amount.unsigned_abs())?;
            }
        }
        for (account, amount) in &net {
            if *amount > 0 {
                self.ensure_receivable(*account, token, associations)?;
                self.credit_token(*account, token, *amount as u64)?;
            }
        }

        let mut nft_transfers = Vec::with_capacity(list.nft_transfers.len());
        for transfer in &list.nft_transfers {
            self.move_nft(token, transfer, auth, associations)?;
            nft_transfers.push(transfer.clone());
        }

        Ok(TokenTransferList {
            token,
            transfers: net
                .into_iter()
                .filter(|(_, amount)| *amount != 0)
                .map(|(account, amount)| AccountAmount::new(account, amount))
                .collect(),
            nft_transfers,
        })
    }

    fn move_nft(
        &mut self,
        token: TokenId,
        transfer: &NftTransfer,
        auth: &Authorizer,
        associations: &mut Vec<TokenAssociation>,
    ) -> Checked<()> {
        let sender = self.account(&transfer.sender)?;
        self.account(&transfer.receiver)?;
        let nft = self
            .nfts
            .get(&(token, transfer.serial_number))
            .ok_or(ResponseCode::InvalidNftId)?;
        if nft.owner != transfer.sender {
            return Err(ResponseCode::SenderDoesNotOwnNftSerialNo);
        }
        if transfer.is_approval {
            let spender = auth.spender();
            let approved = nft.spender == Some(spender) || sender.nft_approved_for_all.contains(&(token, spender));
            if !approved {
                return Err(ResponseCode::SpenderDoesNotHaveAllowance);
            }
        } else {
            auth.require_account(transfer.sender, sender)?;
        }

        self.usable_relationship(transfer.sender, token)?;
        self.ensure_receivable(transfer.receiver, token, associations)?;
        self.debit_token(transfer.sender, token, 1)?;
        self.credit_token(transfer.receiver, token, 1)?;
        if let Some(nft) = self.nfts.get_mut(&(token, transfer.serial_number)) {
            nft.owner = transfer.receiver;
            nft.spender = None;
        }
        Ok(())
    }

    fn spend_crypto_allowance(&mut self, owner: AccountId, amount: u64, auth: &Authorizer) -> Checked<()> {
        let spender = auth.spender();
        let owner = self.account_mut(&owner)?;
        let remaining = owner
            .crypto_allowances
            .get(&spender)
            .copied()
            .ok_or(ResponseCode::SpenderDoesNotHaveAllowance)?;
        let left = remaining.checked_sub(amount).ok_or(ResponseCode::AmountExceedsAllowance)?;
        if left == 0 {
            owner.crypto_allowances.remove(&spender);
        } else {
            owner.crypto_allowances.insert(spender, left);
        }
        Ok(())
    }

    fn spend_token_allowance(&mut self, token: TokenId, owner: AccountId, amount: u64, auth: &Authorizer) -> Checked<()> {
        let spender = auth.spender();
        let owner = self.account_mut(&owner)?;
        let remaining = owner
            .token_allowances
            .get(&(token, spender))
            .copied()
            .ok_or(ResponseCode::SpenderDoesNotHaveAllowance)?;
        let left = remaining.checked_sub(amount).ok_or(ResponseCode::AmountExceedsAllowance)?;
        if left == 0 {
            owner.token_allowances.remove(&(token, spender));
        } else {
            owner.token_allowances.insert((token, spender), left);
        }
        Ok(())
    }

    /// Associated and, for tokens with a KYC key, granted
    fn usable_relationship(&self, account: AccountId, token: TokenId) -> Checked<()> {
        let relationship = self
            .relationship(account, token)
            .ok_or(ResponseCode::TokenNotAssociatedToAccount)?;
        if relationship.kyc == KycStatus::Revoked {
            return Err(ResponseCode::AccountKycNotGrantedForToken);
        }
        Ok(())
    }

    /// Auto-associate the receiver when it has slots left
    fn ensure_receivable(
        &mut self,
        account: AccountId,
        token: TokenId,
        associations: &mut Vec<TokenAssociation>,
    ) -> Checked<()> {
        if self.relationship(account, token).is_none() {
            let state = self.account(&account)?;
            if !state.can_auto_associate() {
                return Err(if state.max_automatic_token_associations == 0 {
                    ResponseCode::TokenNotAssociatedToAccount
                } else {
                    ResponseCode::NoRemainingAutomaticAssociations
                });
            }
            self.associate(account, token, true)?;
            self.account_mut(&account)?.used_automatic_associations += 1;
            associations.push(TokenAssociation { token, account });
        }
        self.usable_relationship(account, token)
    }

    fn debit_token(&mut self, account: AccountId, token: TokenId, amount: u64) -> Checked<()> {
        let relationship = self
            .relationships
            .get_mut(&(account, token))
            .ok_or(ResponseCode::TokenNotAssociatedToAccount)?;
        relationship.balance = relationship
            .balance
            .checked_sub(amount)
            .ok_or(ResponseCode::InsufficientTokenBalance)?;
        Ok(())
    }

    fn credit_token(&mut self, account: AccountId, token: TokenId, amount: u64) -> Checked<()> {
        let relationship = self
            .relationships
            .get_mut(&(account, token))
            .ok_or(ResponseCode::TokenNotAssociatedToAccount)?;
        relationship.balance = relationship
            .balance
            .checked_add(amount)
            .ok_or(ResponseCode::InvalidAccountAmounts)?;
        Ok(())
    }

    pub fn balance(&self, account: AccountId) -> Checked<AccountBalance> {
        let state = self.account(&account)?;
        let tokens = self
            .relationships
            .range((account, TokenId::default())..)
            .take_while(|((owner, _), _)| *owner == account)
            .map(|((_, token), rel)| (*token, rel.balance))
            .collect();
        Ok(AccountBalance {
            account,
            hbars: state.balance,
            tokens,
        })
    }

    pub fn account_info(&self, account: AccountId) -> Checked<AccountInfo> {
        let state = self.account(&account)?;
        let token_relationships = self
            .relationships
            .range((account, TokenId::default())..)
            .take_while(|((owner, _), _)| *owner == account)
            .map(|((_, token), rel)| TokenRelationship {
                token: *token,
                balance: rel.balance,
                kyc_status: rel.kyc,
                automatic_association: rel.automatic,
            })
            .collect();
        Ok(AccountInfo {
            account,
            evm_address: state.alias.unwrap_or_else(|| account.to_mirror_address()),
            alias: state.alias,
            key: state.key.clone(),
            balance: state.balance,
            receiver_sig_required: state.receiver_sig_required,
            memo: state.memo.clone(),
            max_automatic_token_associations: state.max_automatic_token_associations,
            crypto_allowances: state
                .crypto_allowances
                .iter()
                .map(|(spender, amount)| CryptoAllowance {
                    owner: account,
                    spender: *spender,
                    amount: *amount,
                })
                .collect(),
            token_allowances: state
                .token_allowances
                .iter()
                .map(|((token, spender), amount)| TokenAllowance {
                    token: *token,
                    owner: account,
                    spender: *spender,
                    amount: *amount,
                })
                .collect(),
            token_relationships,
        })
    }

    pub fn token_info(&self, token: TokenId) -> Checked<TokenInfo> {
        let state = self.token(&token)?;
        Ok(TokenInfo {
            token,
            name: state.name.clone(),
            symbol: state.symbol.clone(),
            token_type: state.token_type,
            decimals: state.decimals,
            total_supply: state.total_supply,
            treasury: state.treasury,
            evm_address: token.to_mirror_address(),
            admin_key: state.admin_key.clone(),
            supply_key: state.supply_key.clone(),
            kyc_key: state.kyc_key.clone(),
        })
    }

    pub fn contract_info(&self, contract: ContractId) -> Checked<ContractInfo> {
        let state = self.contracts.get(&contract).ok_or(ResponseCode::InvalidContractId)?;
        let account = AccountId::from(contract);
        let account_state = self.account(&account).map_err(|_| ResponseCode::InvalidContractId)?;
        Ok(ContractInfo {
            contract,
            account,
            evm_address: contract.to_mirror_address(),
            program: state.program.clone(),
            balance: account_state.balance,
            memo: state.memo.clone(),
            max_automatic_token_associations: account_state.max_automatic_token_associations,
            admin_key: state.admin_key.clone(),
        })
    }
}

pub fn default_properties() -> BTreeMap<String, String> {
    DEFAULT_PROPERTIES
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn to_signed(amount: u64) -> Checked<i64> {
    i64::try_from(amount).map_err(|_| ResponseCode::InvalidAccountAmounts)
}

fn net_amounts(amounts: &[AccountAmount]) -> Checked<BTreeMap<AccountId, i64>> {
    let mut net = BTreeMap::new();
    for aa in amounts {
        let total = net.entry(aa.account).or_insert(0i64);
        *total = total.checked_add(aa.amount).ok_or(ResponseCode::InvalidAccountAmounts)?;
    }
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hts_common::crypto::KeyMaterial;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Fixture {
        state: LedgerState,
        alice: AccountId,
        alice_key: Vec<u8>,
        bob: AccountId,
        bob_key: Vec<u8>,
        token: TokenId,
    }

    fn fixture() -> Fixture {
        let mut rng = StdRng::seed_from_u64(3);
        let genesis = KeyMaterial::generate(&mut rng);
        let alice_material = KeyMaterial::generate(&mut rng);
        let bob_material = KeyMaterial::generate(&mut rng);
        let mut state = LedgerState::new(genesis.key().clone(), 1_000_000);
        let alice = state.create_account(AccountState::new(alice_material.key().clone(), 500));
        let bob = state.create_account(AccountState::new(bob_material.key().clone(), 0));
        let token = TokenId::from_num(state.next_entity_num());
        state.tokens.insert(
            token,
            TokenState {
                name: "t".to_string(),
                symbol: "T".to_string(),
                token_type: TokenType::FungibleCommon,
                decimals: 0,
                total_supply: 100,
                treasury: alice,
                admin_key: None,
                supply_key: None,
                kyc_key: None,
                next_serial: 1,
            },
        );
        state.associate(alice, token, false).unwrap();
        state.credit_token(alice, token, 100).unwrap();
        Fixture {
            state,
            alice,
            alice_key: alice_material.public_key().unwrap().to_vec(),
            bob,
            bob_key: bob_material.public_key().unwrap().to_vec(),
            token,
        }
    }

    #[test]
    fn test_hbar_transfer_needs_sender_signature() {
        let mut f = fixture();
        let moves = [AccountAmount::new(f.alice, -10), AccountAmount::new(f.bob, 10)];
        let unsigned = Authorizer::Signatures {
            verified: &[],
            payer: GENESIS_ACCOUNT,
        };
        assert_eq!(
            f.state.apply_transfers(&moves, &[], &unsigned),
            Err(ResponseCode::InvalidSignature)
        );

        let verified = vec![f.alice_key.clone()];
        let signed = Authorizer::Signatures {
            verified: &verified,
            payer: GENESIS_ACCOUNT,
        };
        let effects = f.state.apply_transfers(&moves, &[], &signed).unwrap();
        assert_eq!(effects.hbar_transfers.len(), 2);
        assert_eq!(f.state.account(&f.bob).unwrap().balance, 10);
    }

    #[test]
    fn test_non_zero_sum_rejected() {
        let mut f = fixture();
        let moves = [AccountAmount::new(f.alice, -10), AccountAmount::new(f.bob, 9)];
        let auth = Authorizer::Signatures {
            verified: &[],
            payer: GENESIS_ACCOUNT,
        };
        assert_eq!(
            f.state.apply_transfers(&moves, &[], &auth),
            Err(ResponseCode::InvalidAccountAmounts)
        );
    }

    #[test]
    fn test_overflowing_net_change_rejected() {
        let mut f = fixture();
        let moves = [
            AccountAmount::new(f.bob, -i64::MAX),
            AccountAmount::new(f.alice, i64::MAX),
            AccountAmount::new(f.bob, -1),
            AccountAmount::new(f.alice, 1),
        ];
        let verified = vec![f.alice_key.clone(), f.bob_key.clone()];
        let auth = Authorizer::Signatures {
            verified: &verified,
            payer: GENESIS_ACCOUNT,
        };
        assert_eq!(
            f.state.apply_transfers(&moves, &[], &auth),
            Err(ResponseCode::InvalidAccountAmounts)
        );
        assert_eq!(f.state.account(&f.alice).unwrap().balance, 500);
    }

    #[test]
    fn test_token_credit_requires_association() {
        let mut f = fixture();
        let verified = vec![f.alice_key.clone()];
        let auth = Authorizer::Signatures {
            verified: &verified,
            payer: GENESIS_ACCOUNT,
        };
        let list = TokenTransferList::fungible(
            f.token,
            vec![AccountAmount::new(f.alice, -5), AccountAmount::new(f.bob, 5)],
        );
        assert_eq!(
            f.state.apply_transfers(&[], &[list.clone()], &auth),
            Err(ResponseCode::TokenNotAssociatedToAccount)
        );

        f.state.account_mut(&f.bob).unwrap().max_automatic_token_associations = 1;
        let effects = f.state.apply_transfers(&[], &[list], &auth).unwrap();
        assert_eq!(
            effects.automatic_token_associations,
            vec![TokenAssociation {
                token: f.token,
                account: f.bob
            }]
        );
        assert_eq!(f.state.balance(f.bob).unwrap().token(&f.token), 5);
    }

    #[test]
    fn test_allowance_spent_by_payer() {
        let mut f = fixture();
        let owner_keys = vec![f.alice_key.clone()];
        let owner_auth = Authorizer::Signatures {
            verified: &owner_keys,
            payer: f.alice,
        };
        f.state
            .approve_crypto(
                &CryptoAllowance {
                    owner: f.alice,
                    spender: f.bob,
                    amount: 20,
                },
                &owner_auth,
            )
            .unwrap();

        let spender_keys = vec![f.bob_key.clone()];
        let spender_auth = Authorizer::Signatures {
            verified: &spender_keys,
            payer: f.bob,
        };
        let too_much = [AccountAmount::approved(f.alice, -30), AccountAmount::new(f.bob, 30)];
        assert_eq!(
            f.state.clone().apply_transfers(&too_much, &[], &spender_auth),
            Err(ResponseCode::AmountExceedsAllowance)
        );
        let exact = [AccountAmount::approved(f.alice, -20), AccountAmount::new(f.bob, 20)];
        f.state.apply_transfers(&exact, &[], &spender_auth).unwrap();
        assert!(f.state.account(&f.alice).unwrap().crypto_allowances.is_empty());
    }

    #[test]
    fn test_contract_key_active_only_for_that_caller() {
        let contract = ContractId::from_num(1500);
        let key = Key::ContractId(contract);
        let as_caller = Authorizer::Contract {
            caller: contract,
            verified: &[],
        };
        let other = Authorizer::Contract {
            caller: ContractId::from_num(1501),
            verified: &[],
        };
        assert!(as_caller.is_active(&key));
        assert!(!other.is_active(&key));
        assert_eq!(other.signature_failure(), ResponseCode::InvalidFullPrefixSignatureForPrecompile);
        assert!(!as_caller.is_active(&Key::Empty));
    }

    #[test]
    fn test_dissociate_rules() {
        let mut f = fixture();
        assert_eq!(f.state.dissociate(f.alice, f.token), Err(ResponseCode::AccountIsTreasury));
        assert_eq!(
            f.state.dissociate(f.bob, f.token),
            Err(ResponseCode::TokenNotAssociatedToAccount)
        );
        f.state.associate(f.bob, f.token, false).unwrap();
        f.state.credit_token(f.bob, f.token, 1).unwrap();
        assert_eq!(
            f.state.dissociate(f.bob, f.token),
            Err(ResponseCode::TransactionRequiresZeroTokenBalances)
        );
    }

    #[test]
    fn test_property_reset_restores_default() {
        let mut f = fixture();
        f.state.set_property(LAZY_CREATION_ENABLED, "false");
        assert!(!f.state.flag(LAZY_CREATION_ENABLED));
        f.state.reset_property(LAZY_CREATION_ENABLED);
        assert!(f.state.flag(LAZY_CREATION_ENABLED));
        assert_eq!(f.state.number(MAX_PRECEDING_RECORDS), 3);
    }
}
