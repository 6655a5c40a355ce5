//! CLI tool for deploying and operating the lending protocol contracts.

use pluto_lending::lending::interest_rate::{InterestRateModel, InterestRateModelInitArgs};
use pluto_lending::lending::market::{Market, MarketInitArgs};
use pluto_lending::lending::price_feed::ManualPriceFeed;
use pluto_lending::lending::price_oracle::{PriceOracleGateway, PriceOracleGatewayInitArgs};
use pluto_lending::lending::risk_manager::RiskManager;
use pluto_lending::math::EXP_SCALE;
use pluto_lending::token::Cep18TokenHostRef;
use odra::casper_types::{U256, U512};
use odra::host::{Deployer, HostEnv, HostRef, NoArgs};
use odra::prelude::{Address, Addressable};
use odra::schema::casper_contract_schema::NamedCLType;
use odra_cli::{
    deploy::DeployScript,
    scenario::{Args, Error, Scenario, ScenarioMetadata},
    CommandArg, ContractProvider, DeployedContractsContainer, DeployerExt,
    OdraCli,
};

/// Fee per market price pull (0.1 CSPR)
const DEFAULT_PRICE_COST: u64 = 100_000_000;

/// Gas for a single admin call
const CALL_GAS: u64 = 50_000_000_000;

/// `percent`% as a 1e18 mantissa
fn mantissa(percent: u128) -> U256 {
    U256::from(EXP_SCALE) * U256::from(percent) / U256::from(100u8)
}

/// Deploys the interest rate model, price feed, oracle gateway and risk
/// manager, and points the risk manager at the gateway.
pub struct ProtocolDeployScript;

impl DeployScript for ProtocolDeployScript {
    fn deploy(
        &self,
        env: &HostEnv,
        container: &mut DeployedContractsContainer
    ) -> Result<(), odra_cli::deploy::Error> {
        let _interest_rate_model = InterestRateModel::load_or_deploy(
            &env,
            InterestRateModelInitArgs {
                base_rate_per_year: mantissa(2),
                multiplier_per_year: mantissa(70),
                jump_multiplier_per_year: mantissa(300),
                kink: mantissa(80),
            },
            container,
            300_000_000_000
        )?;

        let feed = ManualPriceFeed::load_or_deploy(&env, NoArgs, container, 200_000_000_000)?;

        let oracle = PriceOracleGateway::load_or_deploy(
            &env,
            PriceOracleGatewayInitArgs {
                feed: feed.address().clone(),
                default_price_cost: U512::from(DEFAULT_PRICE_COST),
            },
            container,
            300_000_000_000
        )?;

        let mut risk_manager = RiskManager::load_or_deploy(&env, NoArgs, container, 400_000_000_000)?;
        if risk_manager.get_price_oracle() != Some(oracle.address().clone()) {
            env.set_gas(CALL_GAS);
            risk_manager.set_price_oracle(oracle.address().clone());
        }

        Ok(())
    }
}

/// Deploys and lists the native currency market.
/// Requires the protocol to be deployed first.
pub struct NativeMarketDeployScript;

impl DeployScript for NativeMarketDeployScript {
    fn deploy(
        &self,
        env: &HostEnv,
        container: &mut DeployedContractsContainer
    ) -> Result<(), odra_cli::deploy::Error> {
        let mut risk_manager = container.contract_ref::<RiskManager>(env)?;
        let interest_rate_model = container.contract_ref::<InterestRateModel>(env)?;

        let mut market = Market::load_or_deploy(
            &env,
            MarketInitArgs {
                risk_manager: risk_manager.address().clone(),
                interest_rate_model: interest_rate_model.address().clone(),
                underlying: None,
                initial_exchange_rate: mantissa(2),
                name: String::from("Pluto CSPR"),
                symbol: String::from("pCSPR"),
                decimals: 9,
            },
            container,
            500_000_000_000
        )?;

        let market_address = market.address().clone();
        if !risk_manager.is_listed(market_address) {
            env.set_gas(CALL_GAS);
            market.set_reserve_factor(mantissa(15));
            env.set_gas(CALL_GAS);
            risk_manager.support_market(market_address);
        }

        Ok(())
    }
}

/// Deploys the complete protocol with the native market.
pub struct LendingDeployScript;

impl DeployScript for LendingDeployScript {
    fn deploy(
        &self,
        env: &HostEnv,
        container: &mut DeployedContractsContainer
    ) -> Result<(), odra_cli::deploy::Error> {
        ProtocolDeployScript.deploy(env, container)?;
        NativeMarketDeployScript.deploy(env, container)?;
        Ok(())
    }
}

/// Scenario to switch the oracle gateway on.
pub struct ActivateOracleScenario;

impl Scenario for ActivateOracleScenario {
    fn args(&self) -> Vec<CommandArg> {
        vec![]
    }

    fn run(
        &self,
        env: &HostEnv,
        container: &DeployedContractsContainer,
        _args: Args
    ) -> Result<(), Error> {
        let mut oracle = container.contract_ref::<PriceOracleGateway>(env)?;

        env.set_gas(CALL_GAS);
        oracle.try_activate()?;

        println!("Price oracle activated");
        Ok(())
    }
}

impl ScenarioMetadata for ActivateOracleScenario {
    const NAME: &'static str = "activate-oracle";
    const DESCRIPTION: &'static str = "Activates the price oracle gateway";
}

/// Scenario to post a price to the manual price feed.
pub struct PostPriceScenario;

impl Scenario for PostPriceScenario {
    fn args(&self) -> Vec<CommandArg> {
        vec![
            CommandArg::new(
                "market",
                "Address of the market to price",
                NamedCLType::Key,
            ),
            CommandArg::new(
                "price",
                "Price of one unit of underlying, scaled by 1e18",
                NamedCLType::U256,
            ),
        ]
    }

    fn run(
        &self,
        env: &HostEnv,
        container: &DeployedContractsContainer,
        args: Args
    ) -> Result<(), Error> {
        let mut feed = container.contract_ref::<ManualPriceFeed>(env)?;
        let market = args.get_single::<Address>("market")?;
        let price = args.get_single::<U256>("price")?;

        env.set_gas(CALL_GAS);
        feed.try_post_price(market, price)?;

        println!("Price posted");
        Ok(())
    }
}

impl ScenarioMetadata for PostPriceScenario {
    const NAME: &'static str = "post-price";
    const DESCRIPTION: &'static str = "Posts a market price to the manual price feed";
}

/// Scenario to deploy and list a market for a CEP-18 token.
///
/// Sets a 15% reserve factor, lists the market and sets its collateral
/// factor, paying the quoted price cost.
pub struct ListTokenMarketScenario;

impl Scenario for ListTokenMarketScenario {
    fn args(&self) -> Vec<CommandArg> {
        vec![
            CommandArg::new(
                "token",
                "Address of the underlying CEP-18 token",
                NamedCLType::Key,
            ),
            CommandArg::new(
                "collateral_factor",
                "Collateral factor, scaled by 1e18",
                NamedCLType::U256,
            ),
        ]
    }

    fn run(
        &self,
        env: &HostEnv,
        container: &DeployedContractsContainer,
        args: Args
    ) -> Result<(), Error> {
        let mut risk_manager = container.contract_ref::<RiskManager>(env)?;
        let interest_rate_model = container.contract_ref::<InterestRateModel>(env)?;
        let oracle = container.contract_ref::<PriceOracleGateway>(env)?;
        let token = args.get_single::<Address>("token")?;
        let collateral_factor = args.get_single::<U256>("collateral_factor")?;

        let underlying = Cep18TokenHostRef::new(token, env.clone());
        let symbol = underlying.symbol();

        env.set_gas(500_000_000_000);
        let mut market = Market::try_deploy(
            env,
            MarketInitArgs {
                risk_manager: risk_manager.address().clone(),
                interest_rate_model: interest_rate_model.address().clone(),
                underlying: Some(token),
                initial_exchange_rate: mantissa(2),
                name: format!("Pluto {}", symbol),
                symbol: format!("p{}", symbol),
                decimals: underlying.decimals(),
            },
        )?;
        let market_address = market.address().clone();

        env.set_gas(CALL_GAS);
        market.try_set_reserve_factor(mantissa(15))?;

        env.set_gas(CALL_GAS);
        risk_manager.try_support_market(market_address)?;

        let price_cost = oracle.get_price_cost(market_address);
        env.set_gas(CALL_GAS);
        risk_manager
            .with_tokens(price_cost)
            .try_set_collateral_factor(market_address, collateral_factor)?;

        println!("Market p{} listed at {:?}", symbol, market_address);
        Ok(())
    }
}

impl ScenarioMetadata for ListTokenMarketScenario {
    const NAME: &'static str = "list-token-market";
    const DESCRIPTION: &'static str = "Deploys and lists a market for a CEP-18 token";
}

/// Scenario to print the price of every listed market.
pub struct ViewPricesScenario;

impl Scenario for ViewPricesScenario {
    fn args(&self) -> Vec<CommandArg> {
        vec![]
    }

    fn run(
        &self,
        env: &HostEnv,
        container: &DeployedContractsContainer,
        _args: Args
    ) -> Result<(), Error> {
        let risk_manager = container.contract_ref::<RiskManager>(env)?;
        let oracle = container.contract_ref::<PriceOracleGateway>(env)?;

        for market in risk_manager.get_all_markets() {
            let price_cost = oracle.get_price_cost(market);
            env.set_gas(CALL_GAS);
            let quote = oracle
                .with_tokens(price_cost)
                .try_get_underlying_price(market)?;
            println!("{:?}: price {} at {}", market, quote.price, quote.timestamp);
        }
        Ok(())
    }
}

impl ScenarioMetadata for ViewPricesScenario {
    const NAME: &'static str = "view-prices";
    const DESCRIPTION: &'static str = "Pulls and prints the price of every listed market";
}

/// Main function to run the CLI tool.
pub fn main() {
    OdraCli::new()
        .about("CLI tool for the Pluto lending protocol contracts")
        // Deploy scripts
        .deploy(ProtocolDeployScript)
        .deploy(NativeMarketDeployScript)
        .deploy(LendingDeployScript)
        // Contract references
        .contract::<InterestRateModel>()
        .contract::<ManualPriceFeed>()
        .contract::<PriceOracleGateway>()
        .contract::<RiskManager>()
        .contract::<Market>()
        // Scenarios
        .scenario(ActivateOracleScenario)
        .scenario(PostPriceScenario)
        .scenario(ListTokenMarketScenario)
        .scenario(ViewPricesScenario)
        .build()
        .run();
}
